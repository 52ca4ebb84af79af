//! Error types for Link AI
//!
//! This module defines the domain error type used throughout the service,
//! using `thiserror` for ergonomic error handling. HTTP-facing errors live in
//! [`crate::server::response::ApiError`], which maps these variants onto
//! status codes and stable machine-readable codes.

use thiserror::Error;

/// Main error type for Link AI operations
///
/// Covers configuration loading, collaborator failures (AI provider, chat
/// service, privacy store, summary cache), authentication and throttling.
#[derive(Error, Debug)]
pub enum LinkError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// AI provider errors (API calls, malformed responses)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Chat service errors (transport failures, bad responses)
    #[error("Chat service error: {0}")]
    Chat(String),

    /// The chat service does not know the requested conversation
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// Privacy/consent storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Summary cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Authentication errors (missing, malformed or expired token)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Request validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limit exceeded for a caller
    #[error("Rate limit exceeded: limit={limit}, retry after {retry_after_secs}s")]
    RateLimitExceeded {
        /// Configured requests per minute
        limit: u32,
        /// Seconds until the next request would be admitted
        retry_after_secs: u64,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JWT encoding/decoding errors
    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Result type alias for Link AI operations
///
/// Uses `anyhow::Error` so callers can attach context while still being able
/// to downcast to [`LinkError`] at the HTTP boundary.
pub type Result<T> = anyhow::Result<T>;
