//! Process-local summary cache

use super::{conversation_prefix, Summary, SummaryCache};
use crate::error::{LinkError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// [`SummaryCache`] kept in a map behind an async read-write lock
///
/// Expired entries are removed when read or when the cache is swept.
#[derive(Debug, Default)]
pub struct MemorySummaryCache {
    entries: RwLock<HashMap<String, Summary>>,
}

impl MemorySummaryCache {
    /// Create an empty cache
    ///
    /// # Examples
    ///
    /// ```
    /// use link_ai::cache::{MemorySummaryCache, SummaryCache};
    ///
    /// # tokio_test::block_on(async {
    /// let cache = MemorySummaryCache::new();
    /// assert!(cache.is_empty().await);
    /// assert!(cache.get_summary("summary:missing").await.unwrap().is_none());
    /// # });
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when no entries are stored
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SummaryCache for MemorySummaryCache {
    async fn get_summary(&self, key: &str) -> Result<Option<Summary>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(summary) if !summary.is_expired() => return Ok(Some(summary.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(Summary::is_expired) {
            entries.remove(key);
            tracing::debug!(key, "Evicted expired summary");
        }
        Ok(None)
    }

    async fn set_summary(&self, key: &str, summary: Summary) -> Result<()> {
        if !key.starts_with(&conversation_prefix(summary.conversation_id)) {
            return Err(LinkError::Cache(format!(
                "cache key {} does not belong to conversation {}",
                key, summary.conversation_id
            ))
            .into());
        }
        self.entries.write().await.insert(key.to_string(), summary);
        Ok(())
    }

    async fn invalidate_by_conversation(&self, conversation_id: Uuid) -> Result<usize> {
        let prefix = conversation_prefix(conversation_id);
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        Ok(before - entries.len())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = chrono::Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, summary| !summary.is_expired_at(now));
        Ok(before - entries.len())
    }

    async fn health(&self) -> Result<()> {
        let _ = self.entries.read().await.len();
        Ok(())
    }
}
