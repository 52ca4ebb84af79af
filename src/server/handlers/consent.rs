//! Consent, audit log and policy endpoints

use super::summarize::audit;
use crate::auth::AuthenticatedUser;
use crate::privacy::{actions, AuditLogEntry, ConsentRecord, ConsentUpdate, PrivacyPolicy};
use crate::server::extract::ClientInfo;
use crate::server::response::ApiError;
use crate::server::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Default page size for audit queries
pub const DEFAULT_AUDIT_LIMIT: u32 = 50;
/// Largest page size for audit queries
pub const MAX_AUDIT_LIMIT: u32 = 200;

/// Query parameters for `GET /api/v1/ai/consent/audit`
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    limit: Option<u32>,
    offset: Option<u32>,
}

/// One page of audit entries
#[derive(Debug, Serialize)]
pub struct AuditPage {
    /// Entries, newest first
    pub entries: Vec<AuditLogEntry>,
    /// Effective page size
    pub limit: u32,
    /// Entries skipped
    pub offset: u32,
}

fn consent_resource(user_id: &str) -> String {
    format!("consent:{}", user_id)
}

/// `GET /api/v1/ai/consent`
pub async fn get_consent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ConsentRecord>, ApiError> {
    let record = state.privacy.get_user_consent(&user.user_id).await?;
    let record = record.unwrap_or_else(|| {
        ConsentRecord::none(&user.user_id, state.privacy.active_policy().version)
    });
    Ok(Json(record))
}

/// `PUT /api/v1/ai/consent`
pub async fn update_consent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    client: ClientInfo,
    body: Result<Json<ConsentUpdate>, JsonRejection>,
) -> Result<Json<ConsentRecord>, ApiError> {
    let Json(update) = body.map_err(|rejection| {
        ApiError::validation(format!("Invalid request body: {}", rejection.body_text()))
    })?;
    if update.is_empty() {
        return Err(ApiError::validation(
            "At least one of ai_processing_consent or data_anonymization_consent is required",
        ));
    }

    let record = state
        .privacy
        .update_user_consent(&user.user_id, update)
        .await?;
    tracing::info!(
        user_id = %user.user_id,
        ai_processing = record.ai_processing_consent,
        anonymization = record.data_anonymization_consent,
        "Consent updated"
    );

    audit(
        &state,
        &user,
        &client,
        actions::CONSENT_UPDATED,
        &consent_resource(&user.user_id),
        json!({
            "ai_processing_consent": update.ai_processing_consent,
            "data_anonymization_consent": update.data_anonymization_consent,
            "policy_version": record.policy_version,
        }),
    )
    .await;

    Ok(Json(record))
}

/// `DELETE /api/v1/ai/consent`
pub async fn revoke_consent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    client: ClientInfo,
) -> Result<Json<ConsentRecord>, ApiError> {
    let record = state.privacy.revoke_all_consent(&user.user_id).await?;
    tracing::info!(user_id = %user.user_id, "Consent revoked");

    audit(
        &state,
        &user,
        &client,
        actions::CONSENT_REVOKED,
        &consent_resource(&user.user_id),
        json!({ "policy_version": record.policy_version }),
    )
    .await;

    Ok(Json(record))
}

/// `GET /api/v1/ai/consent/audit`
pub async fn list_audit_logs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<Json<AuditPage>, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        ApiError::validation(format!("Invalid query: {}", rejection.body_text()))
    })?;

    let limit = match query.limit {
        Some(0) | None => DEFAULT_AUDIT_LIMIT,
        Some(n) => n.min(MAX_AUDIT_LIMIT),
    };
    let offset = query.offset.unwrap_or(0);

    let entries = state
        .privacy
        .get_user_audit_logs(&user.user_id, limit, offset)
        .await?;

    Ok(Json(AuditPage {
        entries,
        limit,
        offset,
    }))
}

/// `GET /api/v1/ai/consent/policy`
pub async fn get_policy(State(state): State<AppState>) -> Json<PrivacyPolicy> {
    Json(state.privacy.active_policy())
}
