//! Middleware chain
//!
//! Applied outermost first: panic recovery, request logging, JWT
//! authentication, rate limiting. Each stage may answer the request itself,
//! in which case the inner stages never run.

use super::response::ApiError;
use super::state::AppState;
use crate::auth::{bearer_token, AuthenticatedUser};
use crate::error::LinkError;
use crate::metrics;
use crate::rate_limit::{retry_after_secs, RateLimitDecision};
use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

/// Turn a panic inside a handler into a 500 response
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %detail, "Request handler panicked");

    ApiError::internal("Internal server error").into_response()
}

/// Log every request and record HTTP metrics
///
/// The level follows the status: `info` below 400, `warn` for 4xx and
/// `error` for 5xx. A panic in an inner stage is logged and counted as a 500
/// here, then resumed so the recovery layer produces the response.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let elapsed = started.elapsed();
            tracing::error!(
                %method,
                %path,
                status = 500u16,
                duration_ms = elapsed.as_millis() as u64,
                user_id = "-",
                "request panicked"
            );
            metrics::record_http_request(method.as_str(), &route, 500, elapsed);
            std::panic::resume_unwind(payload);
        }
    };

    let elapsed = started.elapsed();
    let status = response.status();
    let user_id = response
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.user_id.as_str())
        .unwrap_or("-");
    log_completed(&method, &path, status.as_u16(), elapsed, user_id);

    metrics::record_http_request(method.as_str(), &route, status.as_u16(), elapsed);
    response
}

fn log_completed(
    method: &axum::http::Method,
    path: &str,
    status: u16,
    elapsed: Duration,
    user_id: &str,
) {
    let duration_ms = elapsed.as_millis() as u64;
    if status >= 500 {
        tracing::error!(%method, %path, status, duration_ms, user_id, "request failed");
    } else if status >= 400 {
        tracing::warn!(%method, %path, status, duration_ms, user_id, "request rejected");
    } else {
        tracing::info!(%method, %path, status, duration_ms, user_id, "request completed");
    }
}

/// Require a valid `Authorization: Bearer <jwt>` header
///
/// On success the caller's [`AuthenticatedUser`] is placed in the request
/// extensions for handlers and in the response extensions for logging.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("Malformed Authorization header"))?;

    let token = bearer_token(header_value)
        .ok_or_else(|| ApiError::unauthorized("Authorization header must use the Bearer scheme"))?;

    let user = state.jwt.validate(token).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(user.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    Ok(response)
}

/// Throttle each authenticated user with the shared token-bucket limiter
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.user_id.clone())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let limit = state.rate_limiter.requests_per_minute();
    match state.rate_limiter.check(&user_id) {
        RateLimitDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            Ok(response)
        }
        RateLimitDecision::Limited { retry_after } => {
            let secs = retry_after_secs(retry_after);
            tracing::warn!(user_id = %user_id, retry_after_secs = secs, "Rate limit exceeded");
            metrics::record_rate_limited();
            Err(LinkError::RateLimitExceeded {
                limit,
                retry_after_secs: secs,
            }
            .into())
        }
    }
}
