//! Privacy: consent records, audit log and the active policy
//!
//! Nothing reaches the model without the user's AI-processing consent, and
//! every access to conversation data leaves an audit entry. The
//! [`PrivacyStore`] trait is the single seam for both.

pub mod memory;
pub mod sqlite;
pub mod types;

pub use memory::InMemoryPrivacyStore;
pub use sqlite::SqlitePrivacyStore;
pub use types::{
    actions, AuditLogEntry, ConsentRecord, ConsentUpdate, NewAuditEntry, PrivacyPolicy,
};

use crate::config::PrivacyConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Consent and audit persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrivacyStore: Send + Sync {
    /// Has the user allowed their conversations to be sent to the model
    async fn has_ai_processing_consent(&self, user_id: &str) -> Result<bool>;

    /// Has the user asked for sender names to be pseudonymized
    async fn has_data_anonymization_consent(&self, user_id: &str) -> Result<bool>;

    /// Append an audit entry
    async fn log_action(&self, entry: NewAuditEntry) -> Result<()>;

    /// The user's consent record, if one was ever written
    async fn get_user_consent(&self, user_id: &str) -> Result<Option<ConsentRecord>>;

    /// Apply a partial consent update, creating the record if needed
    async fn update_user_consent(
        &self,
        user_id: &str,
        update: ConsentUpdate,
    ) -> Result<ConsentRecord>;

    /// Withdraw every consent flag for the user
    async fn revoke_all_consent(&self, user_id: &str) -> Result<ConsentRecord>;

    /// The user's audit entries, newest first
    async fn get_user_audit_logs(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<AuditLogEntry>>;

    /// The policy new consent is recorded against
    fn active_policy(&self) -> PrivacyPolicy;

    /// Check that the backing database is usable
    async fn health(&self) -> Result<()>;
}

/// Build the privacy store described by `config`
///
/// # Errors
///
/// Returns error if the database cannot be opened or initialized
pub fn create_privacy_store(config: &PrivacyConfig) -> Result<Arc<dyn PrivacyStore>> {
    let policy = PrivacyPolicy::from(config);
    let store = match &config.database_path {
        Some(path) => SqlitePrivacyStore::new_with_path(path, policy)?,
        None => SqlitePrivacyStore::new(policy)?,
    };
    Ok(Arc::new(store))
}
