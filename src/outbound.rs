//! Shared plumbing for outbound HTTP clients
//!
//! The chat store and the AI provider both talk to upstream services over
//! `reqwest`. They build their clients and translate non-success statuses
//! through the helpers here so every upstream failure surfaces as the same
//! kind of [`LinkError`].

use crate::error::{LinkError, Result};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Upstream service a request was sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// The chat message service
    Chat,
    /// The AI model server
    Ai,
}

impl Upstream {
    fn name(self) -> &'static str {
        match self {
            Self::Chat => "chat service",
            Self::Ai => "AI provider",
        }
    }

    fn error(self, message: String) -> LinkError {
        match self {
            Self::Chat => LinkError::Chat(message),
            Self::Ai => LinkError::Provider(message),
        }
    }
}

/// Build an HTTP client with the service user agent and a request timeout
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("link-ai/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LinkError::Config(format!("Failed to create HTTP client: {}", e)).into())
}

/// Map a transport-level failure (connect, timeout, body read) to a domain error
pub fn transport_error(upstream: Upstream, err: reqwest::Error) -> LinkError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.to_string()
    };
    tracing::error!(upstream = upstream.name(), "Upstream request failed: {}", reason);
    upstream.error(format!("{} request failed: {}", upstream.name(), reason))
}

/// Pass a successful response through, or turn its status into a domain error
///
/// A 404 from the chat service means the conversation does not exist and
/// becomes [`LinkError::ConversationNotFound`] with `resource` as its payload.
/// Every other non-success status maps to the upstream's generic error.
pub async fn check_status(upstream: Upstream, resource: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(
        upstream = upstream.name(),
        status = status.as_u16(),
        "Upstream returned error: {}",
        truncate(&body, 200)
    );

    Err(status_error(upstream, resource, status, &body).into())
}

fn status_error(upstream: Upstream, resource: &str, status: StatusCode, body: &str) -> LinkError {
    if upstream == Upstream::Chat && status == StatusCode::NOT_FOUND {
        return LinkError::ConversationNotFound(resource.to_string());
    }

    let what = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "rejected our credentials",
        StatusCode::NOT_FOUND => "has no such resource",
        StatusCode::TOO_MANY_REQUESTS => "is throttling requests",
        s if s.is_server_error() => "is unavailable",
        _ => "rejected the request",
    };

    let detail = truncate(body, 200);
    let message = if detail.is_empty() {
        format!("{} {} ({})", upstream.name(), what, status.as_u16())
    } else {
        format!("{} {} ({}): {}", upstream.name(), what, status.as_u16(), detail)
    };
    upstream.error(message)
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
