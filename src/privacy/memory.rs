//! In-memory privacy store for tests and local development
//!
//! Counts consent lookups so tests can assert the order in which the
//! summarization pipeline consults its collaborators.

use super::types::{AuditLogEntry, ConsentRecord, ConsentUpdate, NewAuditEntry, PrivacyPolicy};
use super::PrivacyStore;
use crate::error::{LinkError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// [`PrivacyStore`] kept in process memory
#[derive(Debug)]
pub struct InMemoryPrivacyStore {
    policy: PrivacyPolicy,
    consents: RwLock<HashMap<String, ConsentRecord>>,
    audit: RwLock<Vec<AuditLogEntry>>,
    consent_checks: AtomicUsize,
    fail_consent: AtomicBool,
    fail_audit: AtomicBool,
}

impl InMemoryPrivacyStore {
    /// Create an empty store recording consent against `policy`
    pub fn new(policy: PrivacyPolicy) -> Self {
        Self {
            policy,
            consents: RwLock::new(HashMap::new()),
            audit: RwLock::new(Vec::new()),
            consent_checks: AtomicUsize::new(0),
            fail_consent: AtomicBool::new(false),
            fail_audit: AtomicBool::new(false),
        }
    }

    /// Grant or withdraw both consent flags for a user
    pub async fn set_consent(&self, user_id: &str, ai_processing: bool, anonymization: bool) {
        let mut record = ConsentRecord::none(user_id, &self.policy.version);
        record.ai_processing_consent = ai_processing;
        record.data_anonymization_consent = anonymization;
        self.consents
            .write()
            .await
            .insert(user_id.to_string(), record);
    }

    /// Make consent lookups fail
    pub fn set_consent_failing(&self, fail: bool) {
        self.fail_consent.store(fail, Ordering::SeqCst);
    }

    /// Make audit writes fail
    pub fn set_audit_failing(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Number of consent lookups so far
    pub fn consent_check_count(&self) -> usize {
        self.consent_checks.load(Ordering::SeqCst)
    }

    /// Every audit entry written so far, oldest first
    pub async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit.read().await.clone()
    }

    fn check_consent_available(&self) -> Result<()> {
        self.consent_checks.fetch_add(1, Ordering::SeqCst);
        if self.fail_consent.load(Ordering::SeqCst) {
            return Err(LinkError::Storage("consent database unavailable".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl PrivacyStore for InMemoryPrivacyStore {
    async fn has_ai_processing_consent(&self, user_id: &str) -> Result<bool> {
        self.check_consent_available()?;
        Ok(self
            .consents
            .read()
            .await
            .get(user_id)
            .is_some_and(|c| c.ai_processing_consent))
    }

    async fn has_data_anonymization_consent(&self, user_id: &str) -> Result<bool> {
        self.check_consent_available()?;
        Ok(self
            .consents
            .read()
            .await
            .get(user_id)
            .is_some_and(|c| c.data_anonymization_consent))
    }

    async fn log_action(&self, entry: NewAuditEntry) -> Result<()> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(LinkError::Storage("audit log unavailable".to_string()).into());
        }
        self.audit.write().await.push(entry.into_entry());
        Ok(())
    }

    async fn get_user_consent(&self, user_id: &str) -> Result<Option<ConsentRecord>> {
        Ok(self.consents.read().await.get(user_id).cloned())
    }

    async fn update_user_consent(
        &self,
        user_id: &str,
        update: ConsentUpdate,
    ) -> Result<ConsentRecord> {
        let mut consents = self.consents.write().await;
        let record = consents
            .entry(user_id.to_string())
            .or_insert_with(|| ConsentRecord::none(user_id, &self.policy.version));
        record.apply(&update, &self.policy.version);
        Ok(record.clone())
    }

    async fn revoke_all_consent(&self, user_id: &str) -> Result<ConsentRecord> {
        self.update_user_consent(
            user_id,
            ConsentUpdate {
                ai_processing_consent: Some(false),
                data_anonymization_consent: Some(false),
            },
        )
        .await
    }

    async fn get_user_audit_logs(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<AuditLogEntry>> {
        Ok(self
            .audit
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn active_policy(&self) -> PrivacyPolicy {
        self.policy.clone()
    }

    async fn health(&self) -> Result<()> {
        if self.fail_consent.load(Ordering::SeqCst) {
            return Err(LinkError::Storage("consent database unavailable".to_string()).into());
        }
        Ok(())
    }
}
