//! Route handlers

pub mod consent;
pub mod health;
pub mod models;
pub mod summarize;

use super::response::ApiError;
use axum::http::Uri;

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}
