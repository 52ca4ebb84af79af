//! Summary cache
//!
//! Generated summaries are cached per (conversation, user, message limit) so
//! repeated requests are served without touching the chat service or the
//! model. Entries carry their own expiry; an expired entry reads as absent
//! and is deleted by the periodic sweep started with [`spawn_expiry_sweeper`].

pub mod memory;
pub mod sqlite;

pub use memory::MemorySummaryCache;
pub use sqlite::SqliteSummaryCache;

use crate::config::{CacheBackend, CacheConfig};
use crate::error::Result;
use crate::providers::SummarizeResponse;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A cached summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Summary identifier, reused as the response id on cache hits
    pub id: Uuid,
    /// Conversation the summary covers
    pub conversation_id: Uuid,
    /// Summary text
    pub content: String,
    /// Response details needed to rebuild a full response on a hit
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// When the summary was generated
    pub created_at: DateTime<Utc>,
    /// When the entry stops being served
    pub expires_at: DateTime<Utc>,
}

impl Summary {
    /// Build a cache entry from a freshly generated response
    pub fn from_response(response: &SummarizeResponse, anonymized: bool, ttl: Duration) -> Self {
        let mut metadata = response.metadata.clone();
        metadata.insert(
            "message_count".to_string(),
            serde_json::json!(response.message_count),
        );
        metadata.insert(
            "tokens_used".to_string(),
            serde_json::json!(response.tokens_used),
        );
        metadata.insert("model".to_string(), serde_json::json!(response.model));
        metadata.insert("anonymized".to_string(), serde_json::json!(anonymized));

        Self {
            id: response.id,
            conversation_id: response.conversation_id,
            content: response.summary.clone(),
            metadata,
            created_at: response.created_at,
            expires_at: Utc::now() + ttl,
        }
    }

    /// Rebuild the client response for a cache hit
    pub fn to_response(&self, processing_time: u64) -> SummarizeResponse {
        let message_count = self
            .metadata
            .get("message_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;
        let tokens_used = self
            .metadata
            .get("tokens_used")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        let model = self
            .metadata
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        SummarizeResponse {
            id: self.id,
            conversation_id: self.conversation_id,
            summary: self.content.clone(),
            message_count,
            tokens_used,
            model,
            processing_time,
            cached_result: true,
            metadata: self.metadata.clone(),
            created_at: self.created_at,
        }
    }

    /// True once `now` has reached the expiry
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True once the entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Storage for generated summaries
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummaryCache: Send + Sync {
    /// Look up a summary; expired entries read as `None`
    async fn get_summary(&self, key: &str) -> Result<Option<Summary>>;

    /// Store a summary under `key`, replacing any previous entry
    async fn set_summary(&self, key: &str, summary: Summary) -> Result<()>;

    /// Drop every entry for a conversation; returns how many were removed
    async fn invalidate_by_conversation(&self, conversation_id: Uuid) -> Result<usize>;

    /// Delete every expired entry; returns how many were removed
    async fn purge_expired(&self) -> Result<usize>;

    /// Check that the cache backend is usable
    async fn health(&self) -> Result<()>;
}

/// Derive the cache key for a summary request
///
/// The key embeds the conversation id in clear, so entries can be dropped per
/// conversation, and a digest of the user id so raw identities are not
/// persisted in keys.
///
/// # Examples
///
/// ```
/// use link_ai::cache::cache_key;
/// use uuid::Uuid;
///
/// let id = Uuid::nil();
/// assert_eq!(cache_key(id, "user-1", 15), cache_key(id, "user-1", 15));
/// assert_ne!(cache_key(id, "user-1", 15), cache_key(id, "user-1", 20));
/// ```
pub fn cache_key(conversation_id: Uuid, user_id: &str, limit: u32) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    let user_hash: String = digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect();
    format!("summary:{}:{}:{}", conversation_id, user_hash, limit)
}

/// Key prefix shared by every entry of a conversation
pub fn conversation_prefix(conversation_id: Uuid) -> String {
    format!("summary:{}:", conversation_id)
}

/// Run [`SummaryCache::purge_expired`] every `interval` until `shutdown` fires
///
/// A failed sweep is logged and retried on the next tick.
pub fn spawn_expiry_sweeper(
    cache: Arc<dyn SummaryCache>,
    interval: StdDuration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Summary cache sweeper stopping");
                    break;
                }
                _ = ticker.tick() => match cache.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "Purged expired summaries"),
                    Err(e) => tracing::warn!("Summary cache sweep failed: {}", e),
                },
            }
        }
    })
}

/// Build the cache backend described by `config`
///
/// # Errors
///
/// Returns error if the SQLite backend cannot open its database
pub fn build_cache(config: &CacheConfig) -> Result<Arc<dyn SummaryCache>> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemorySummaryCache::new())),
        CacheBackend::Sqlite => {
            let cache = match &config.sqlite_path {
                Some(path) => SqliteSummaryCache::new_with_path(path)?,
                None => SqliteSummaryCache::new()?,
            };
            Ok(Arc::new(cache))
        }
    }
}
