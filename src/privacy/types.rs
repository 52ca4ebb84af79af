//! Consent, audit and policy records

use crate::config::PrivacyConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit action names written by the service
pub mod actions {
    /// A summary was served from the cache
    pub const AI_SUMMARY_CACHE_HIT: &str = "ai_summary_cache_hit";
    /// A summary was generated by the model
    pub const AI_SUMMARY_GENERATED: &str = "ai_summary_generated";
    /// Cached summaries of a conversation were dropped
    pub const AI_SUMMARY_INVALIDATED: &str = "ai_summary_invalidated";
    /// A user changed their consent
    pub const CONSENT_UPDATED: &str = "consent_updated";
    /// A user revoked all consent
    pub const CONSENT_REVOKED: &str = "consent_revoked";
}

/// A user's consent state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// User the record belongs to
    pub user_id: String,
    /// May the user's conversations be sent to the model
    pub ai_processing_consent: bool,
    /// Should sender names be pseudonymized before prompting
    pub data_anonymization_consent: bool,
    /// Privacy policy version the user consented under
    pub policy_version: String,
    /// When the record was first written
    pub created_at: DateTime<Utc>,
    /// When the record last changed
    pub updated_at: DateTime<Utc>,
}

impl ConsentRecord {
    /// A record granting nothing, for users who never gave consent
    pub fn none(user_id: impl Into<String>, policy_version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            ai_processing_consent: false,
            data_anonymization_consent: false,
            policy_version: policy_version.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update and stamp the policy version
    pub fn apply(&mut self, update: &ConsentUpdate, policy_version: &str) {
        if let Some(value) = update.ai_processing_consent {
            self.ai_processing_consent = value;
        }
        if let Some(value) = update.data_anonymization_consent {
            self.data_anonymization_consent = value;
        }
        self.policy_version = policy_version.to_string();
        self.updated_at = Utc::now();
    }
}

/// Partial consent change; absent fields are left unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentUpdate {
    /// New AI processing consent
    #[serde(default)]
    pub ai_processing_consent: Option<bool>,
    /// New anonymization consent
    #[serde(default)]
    pub data_anonymization_consent: Option<bool>,
}

impl ConsentUpdate {
    /// True when the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.ai_processing_consent.is_none() && self.data_anonymization_consent.is_none()
    }
}

/// A stored audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Entry identifier
    pub id: Uuid,
    /// User the action was performed for
    pub user_id: String,
    /// Action name, see [`actions`]
    pub action: String,
    /// Resource acted on, e.g. `conversation:<uuid>`
    pub resource: String,
    /// Action-specific details
    pub details: serde_json::Value,
    /// Client address, when known
    pub ip_address: Option<String>,
    /// Client user agent, when known
    pub user_agent: Option<String>,
    /// When the action happened
    pub created_at: DateTime<Utc>,
}

/// An audit entry to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    /// User the action was performed for
    pub user_id: String,
    /// Action name
    pub action: String,
    /// Resource acted on
    pub resource: String,
    /// Action-specific details
    pub details: serde_json::Value,
    /// Client address
    pub ip_address: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
}

impl NewAuditEntry {
    /// Start an entry with empty details and no client information
    ///
    /// # Examples
    ///
    /// ```
    /// use link_ai::privacy::{actions, NewAuditEntry};
    ///
    /// let entry = NewAuditEntry::new("user-1", actions::CONSENT_REVOKED, "consent:user-1")
    ///     .with_client(Some("10.0.0.1".to_string()), None);
    /// assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
    /// ```
    pub fn new(
        user_id: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            action: action.into(),
            resource: resource.into(),
            details: serde_json::json!({}),
            ip_address: None,
            user_agent: None,
        }
    }

    /// Attach action details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Attach client address and user agent
    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    /// Materialize the entry with a fresh id and timestamp
    pub fn into_entry(self) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            action: self.action,
            resource: self.resource,
            details: self.details,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: Utc::now(),
        }
    }
}

/// The privacy policy users consent to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyPolicy {
    /// Policy version
    pub version: String,
    /// Date the policy took effect
    pub effective_date: String,
    /// Short human-readable summary
    pub summary: String,
    /// Where the full text lives
    pub url: String,
}

impl From<&PrivacyConfig> for PrivacyPolicy {
    fn from(config: &PrivacyConfig) -> Self {
        Self {
            version: config.policy_version.clone(),
            effective_date: config.policy_effective_date.clone(),
            summary: config.policy_summary.clone(),
            url: config.policy_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_record_grants_nothing() {
        let record = ConsentRecord::none("u1", "1.0");
        assert!(!record.ai_processing_consent);
        assert!(!record.data_anonymization_consent);
        assert_eq!(record.policy_version, "1.0");
    }

    #[test]
    fn test_apply_partial_update() {
        let mut record = ConsentRecord::none("u1", "1.0");
        record.apply(
            &ConsentUpdate {
                ai_processing_consent: Some(true),
                data_anonymization_consent: None,
            },
            "2.0",
        );
        assert!(record.ai_processing_consent);
        assert!(!record.data_anonymization_consent);
        assert_eq!(record.policy_version, "2.0");
    }

    #[test]
    fn test_consent_update_deserializes_missing_fields() {
        let update: ConsentUpdate = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());
        let update: ConsentUpdate =
            serde_json::from_str(r#"{"data_anonymization_consent": true}"#).unwrap();
        assert!(!update.is_empty());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = PrivacyPolicy::from(&PrivacyConfig::default());
        assert_eq!(policy.version, "1.0");
        assert_eq!(policy.effective_date, "2024-01-01");
    }
}
