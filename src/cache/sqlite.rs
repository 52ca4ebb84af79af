//! SQLite-backed summary cache
//!
//! Survives restarts and can be shared by several processes on one host.

use super::{conversation_prefix, Summary, SummaryCache};
use crate::error::{LinkError, Result};
use crate::storage::{format_timestamp, parse_timestamp, SqliteDatabase};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::path::PathBuf;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS summaries (
    cache_key TEXT PRIMARY KEY,
    id TEXT NOT NULL,
    conversation_id TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata JSON NOT NULL,
    created_at TEXT NOT NULL,
    expires_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_summaries_conversation ON summaries (conversation_id);
";

/// [`SummaryCache`] stored in a SQLite table
#[derive(Debug, Clone)]
pub struct SqliteSummaryCache {
    db: SqliteDatabase,
}

impl SqliteSummaryCache {
    /// Open the cache in the application data directory
    pub fn new() -> Result<Self> {
        Ok(Self {
            db: SqliteDatabase::open_default("summary-cache.db", SCHEMA)?,
        })
    }

    /// Open the cache at a specific path
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        Ok(Self {
            db: SqliteDatabase::new_with_path(db_path, SCHEMA)?,
        })
    }
}

#[async_trait]
impl SummaryCache for SqliteSummaryCache {
    async fn get_summary(&self, key: &str) -> Result<Option<Summary>> {
        let key = key.to_string();
        let row = self
            .db
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, conversation_id, content, metadata, created_at, expires_at_ms
                         FROM summaries WHERE cache_key = ?1",
                        params![key],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, String>(4)?,
                                row.get::<_, i64>(5)?,
                            ))
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        let Some((id, conversation_id, content, metadata, created_at, expires_at_ms)) = row else {
            return Ok(None);
        };

        if expires_at_ms <= Utc::now().timestamp_millis() {
            return Ok(None);
        }

        let expires_at = chrono::DateTime::from_timestamp_millis(expires_at_ms)
            .ok_or_else(|| LinkError::Cache(format!("Invalid expiry {}", expires_at_ms)))?;

        Ok(Some(Summary {
            id: Uuid::parse_str(&id)
                .map_err(|e| LinkError::Cache(format!("Invalid summary id {}: {}", id, e)))?,
            conversation_id: Uuid::parse_str(&conversation_id).map_err(|e| {
                LinkError::Cache(format!("Invalid conversation id {}: {}", conversation_id, e))
            })?,
            content,
            metadata: serde_json::from_str(&metadata)?,
            created_at: parse_timestamp(&created_at)?,
            expires_at,
        }))
    }

    async fn set_summary(&self, key: &str, summary: Summary) -> Result<()> {
        if !key.starts_with(&conversation_prefix(summary.conversation_id)) {
            return Err(LinkError::Cache(format!(
                "cache key {} does not belong to conversation {}",
                key, summary.conversation_id
            ))
            .into());
        }

        let key = key.to_string();
        let metadata = serde_json::to_string(&summary.metadata)?;
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO summaries
                     (cache_key, id, conversation_id, content, metadata, created_at, expires_at_ms)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        key,
                        summary.id.to_string(),
                        summary.conversation_id.to_string(),
                        summary.content,
                        metadata,
                        format_timestamp(summary.created_at),
                        summary.expires_at.timestamp_millis(),
                    ],
                )
                .map_err(|e| LinkError::Cache(format!("Failed to store summary: {}", e)))?;
                Ok(())
            })
            .await
    }

    async fn invalidate_by_conversation(&self, conversation_id: Uuid) -> Result<usize> {
        let conversation_id = conversation_id.to_string();
        self.db
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM summaries WHERE conversation_id = ?1",
                    params![conversation_id],
                )?)
            })
            .await
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now_ms = Utc::now().timestamp_millis();
        self.db
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM summaries WHERE expires_at_ms <= ?1",
                    params![now_ms],
                )?)
            })
            .await
    }

    async fn health(&self) -> Result<()> {
        self.db.ping().await
    }
}
