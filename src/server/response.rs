//! HTTP error responses
//!
//! Every error leaves the service as
//! `{"error": <reason>, "message": <text>, "code": <CODE>, "details": <json|null>}`
//! with a stable machine-readable code.

use crate::error::LinkError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// Stable error codes
pub mod codes {
    /// Malformed or invalid request
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    /// Missing or invalid credentials
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    /// The user has not consented to AI processing
    pub const CONSENT_REQUIRED: &str = "CONSENT_REQUIRED";
    /// Resource does not exist
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// Caller exceeded the rate limit
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    /// Unexpected server failure
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    /// The AI provider failed
    pub const AI_SERVICE_ERROR: &str = "AI_SERVICE_ERROR";
}

/// Error body rendered for every failed request
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
    code: &'a str,
    details: &'a Option<serde_json::Value>,
}

/// An error that renders as a JSON HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Stable code from [`codes`]
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
    /// Optional structured details
    pub details: Option<serde_json::Value>,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    /// Build an error with an explicit status and code
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            retry_after_secs: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// 400 `VALIDATION_ERROR`
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::VALIDATION_ERROR, message)
    }

    /// 401 `UNAUTHORIZED`
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, message)
    }

    /// 403 `CONSENT_REQUIRED`
    pub fn consent_required() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::CONSENT_REQUIRED,
            "AI processing consent is required to summarize conversations",
        )
    }

    /// 404 `NOT_FOUND`
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
    }

    /// 429 `RATE_LIMIT_EXCEEDED` with a `Retry-After` hint
    pub fn rate_limited(limit: u32, retry_after_secs: u64) -> Self {
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            codes::RATE_LIMIT_EXCEEDED,
            format!(
                "Rate limit of {} requests per minute exceeded; retry in {}s",
                limit, retry_after_secs
            ),
        )
        .with_details(json!({
            "limit": limit,
            "retry_after_seconds": retry_after_secs,
        }));
        err.retry_after_secs = Some(retry_after_secs);
        err
    }

    /// 500 `INTERNAL_ERROR`
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL_ERROR,
            message,
        )
    }

    /// 500 `AI_SERVICE_ERROR`
    pub fn ai_service(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::AI_SERVICE_ERROR,
            message,
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.status.as_u16(), self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.status.canonical_reason().unwrap_or("Error"),
            message: &self.message,
            code: self.code,
            details: &self.details,
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<LinkError> for ApiError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Validation(msg) => Self::validation(msg),
            LinkError::Authentication(msg) => Self::unauthorized(msg),
            LinkError::ConversationNotFound(id) => {
                Self::not_found(format!("Conversation {} not found", id))
            }
            LinkError::RateLimitExceeded {
                limit,
                retry_after_secs,
            } => Self::rate_limited(limit, retry_after_secs),
            LinkError::Provider(_) => Self::ai_service("AI service failed to produce a summary"),
            _ => Self::internal("Internal server error"),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<LinkError>() {
            Ok(link_error) => link_error.into(),
            Err(other) => match other.downcast::<ApiError>() {
                Ok(api_error) => api_error,
                Err(_) => Self::internal("Internal server error"),
            },
        }
    }
}
