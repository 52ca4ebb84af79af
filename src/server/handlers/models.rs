//! Model listing and cache invalidation

use super::summarize::audit;
use crate::auth::AuthenticatedUser;
use crate::privacy::actions;
use crate::server::extract::ClientInfo;
use crate::server::response::ApiError;
use crate::server::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

/// `GET /api/v1/ai/models` body
#[derive(Debug, Serialize)]
pub struct ModelList {
    /// Models the provider can serve
    pub models: Vec<String>,
    /// Model used when none is requested
    pub default_model: String,
}

/// `GET /api/v1/ai/models`
pub async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList {
        models: state.provider.supported_models(),
        default_model: state.provider.default_model(),
    })
}

/// `DELETE /api/v1/ai/summaries/:conversation_id`
pub async fn invalidate_summaries(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    client: ClientInfo,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let conversation_id = Uuid::parse_str(&conversation_id).map_err(|_| {
        ApiError::validation("conversation_id must be a valid UUID")
            .with_details(json!({ "field": "conversation_id" }))
    })?;

    let removed = state
        .cache
        .invalidate_by_conversation(conversation_id)
        .await?;
    tracing::info!(%conversation_id, removed, "Invalidated cached summaries");

    audit(
        &state,
        &user,
        &client,
        actions::AI_SUMMARY_INVALIDATED,
        &format!("conversation:{}", conversation_id),
        json!({ "removed": removed }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
