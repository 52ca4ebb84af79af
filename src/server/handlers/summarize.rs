//! `POST /api/v1/ai/summarize`
//!
//! Orchestrates consent, cache, chat, model and audit collaborators in a
//! fixed order with early returns. Cache writes and audit writes are
//! best-effort: their failures are logged and never change the response.

use crate::auth::AuthenticatedUser;
use crate::cache::{cache_key, Summary};
use crate::error::LinkError;
use crate::metrics;
use crate::privacy::{actions, NewAuditEntry};
use crate::providers::{SummarizeMessagesRequest, SummarizeResponse};
use crate::server::extract::ClientInfo;
use crate::server::response::ApiError;
use crate::server::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use uuid::Uuid;

/// Request body
#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeRequest {
    /// Conversation to summarize (UUID)
    pub conversation_id: String,
    /// Number of recent messages to include
    #[serde(default)]
    pub limit: Option<i64>,
}

/// A request that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedRequest {
    /// Conversation to summarize
    pub conversation_id: Uuid,
    /// Effective message limit
    pub limit: u32,
}

impl SummarizeRequest {
    /// Parse the conversation id and resolve the effective limit
    ///
    /// A missing or non-positive limit becomes `default_limit`; anything above
    /// `max_limit` is clamped.
    pub fn validate(&self, default_limit: u32, max_limit: u32) -> Result<ValidatedRequest, ApiError> {
        let conversation_id = Uuid::parse_str(self.conversation_id.trim()).map_err(|_| {
            ApiError::validation("conversation_id must be a valid UUID")
                .with_details(json!({ "field": "conversation_id" }))
        })?;

        let limit = match self.limit {
            Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX).min(max_limit),
            _ => default_limit,
        };

        Ok(ValidatedRequest {
            conversation_id,
            limit,
        })
    }
}

/// Handler for `POST /api/v1/ai/summarize`
pub async fn summarize(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    client: ClientInfo,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        ApiError::validation(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let request = body.validate(
        state.config.summarization.default_message_limit,
        state.config.summarization.max_message_limit,
    )?;

    summarize_conversation(&state, &user, &client, request)
        .await
        .map(Json)
}

/// Run the summarization pipeline for an authenticated, validated request
pub async fn summarize_conversation(
    state: &AppState,
    user: &AuthenticatedUser,
    client: &ClientInfo,
    request: ValidatedRequest,
) -> Result<SummarizeResponse, ApiError> {
    let started = Instant::now();
    let ValidatedRequest {
        conversation_id,
        limit,
    } = request;
    let resource = format!("conversation:{}", conversation_id);

    // Consent gates everything, including cache hits
    let consented = state
        .privacy
        .has_ai_processing_consent(&user.user_id)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user.user_id, "Consent check failed: {:#}", e);
            metrics::record_collaborator_error("privacy");
            ApiError::internal("Failed to verify consent")
        })?;
    if !consented {
        tracing::info!(user_id = %user.user_id, %conversation_id, "Summary refused: no AI consent");
        return Err(ApiError::consent_required());
    }

    let key = cache_key(conversation_id, &user.user_id, limit);
    match state.cache.get_summary(&key).await {
        Ok(Some(summary)) => {
            let response = summary.to_response(started.elapsed().as_millis() as u64);
            audit(
                state,
                user,
                client,
                actions::AI_SUMMARY_CACHE_HIT,
                &resource,
                json!({
                    "summary_id": response.id,
                    "limit": limit,
                }),
            )
            .await;
            metrics::record_summary(true, 0);
            tracing::debug!(%conversation_id, "Served summary from cache");
            return Ok(response);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(%conversation_id, "Cache lookup failed, generating fresh summary: {:#}", e);
            metrics::record_collaborator_error("cache");
        }
    }

    let messages = state
        .chat
        .get_recent_messages(conversation_id, limit)
        .await
        .map_err(|e| match e.downcast_ref::<LinkError>() {
            Some(LinkError::ConversationNotFound(_)) => {
                ApiError::not_found(format!("Conversation {} not found", conversation_id))
            }
            _ => {
                tracing::error!(%conversation_id, "Failed to fetch messages: {:#}", e);
                metrics::record_collaborator_error("chat");
                ApiError::internal("Failed to fetch conversation messages")
            }
        })?;
    if messages.is_empty() {
        return Err(ApiError::not_found(format!(
            "No messages found for conversation {}",
            conversation_id
        )));
    }

    let anonymize = match state
        .privacy
        .has_data_anonymization_consent(&user.user_id)
        .await
    {
        Ok(granted) => granted,
        Err(e) => {
            tracing::warn!(user_id = %user.user_id, "Anonymization consent check failed: {:#}", e);
            false
        }
    };

    let mut response = state
        .provider
        .summarize_messages(SummarizeMessagesRequest {
            conversation_id,
            user_id: user.user_id.clone(),
            messages,
            anonymize,
        })
        .await
        .map_err(|e| {
            tracing::error!(%conversation_id, "AI summarization failed: {:#}", e);
            metrics::record_collaborator_error("ai");
            ApiError::ai_service("AI service failed to produce a summary")
        })?;

    response.cached_result = false;
    response.processing_time = started.elapsed().as_millis() as u64;
    response
        .metadata
        .insert("anonymized".to_string(), json!(anonymize));

    let ttl = chrono::Duration::seconds(state.config.cache.summary_ttl_seconds as i64);
    if let Err(e) = state
        .cache
        .set_summary(&key, Summary::from_response(&response, anonymize, ttl))
        .await
    {
        tracing::warn!(%conversation_id, "Failed to cache summary: {:#}", e);
        metrics::record_collaborator_error("cache");
    }

    audit(
        state,
        user,
        client,
        actions::AI_SUMMARY_GENERATED,
        &resource,
        json!({
            "summary_id": response.id,
            "message_count": response.message_count,
            "tokens_used": response.tokens_used,
            "anonymized": anonymize,
            "model": response.model,
            "processing_time_ms": response.processing_time,
        }),
    )
    .await;

    metrics::record_summary(false, response.tokens_used);
    tracing::info!(
        %conversation_id,
        message_count = response.message_count,
        tokens_used = response.tokens_used,
        processing_time_ms = response.processing_time,
        "Generated summary"
    );

    Ok(response)
}

/// Best-effort audit write
pub(crate) async fn audit(
    state: &AppState,
    user: &AuthenticatedUser,
    client: &ClientInfo,
    action: &str,
    resource: &str,
    details: serde_json::Value,
) {
    let entry = NewAuditEntry::new(&user.user_id, action, resource)
        .with_details(details)
        .with_client(client.ip_address.clone(), client.user_agent.clone());

    if let Err(e) = state.privacy.log_action(entry).await {
        tracing::warn!(user_id = %user.user_id, action, "Failed to write audit entry: {:#}", e);
        metrics::record_collaborator_error("privacy");
    }
}
