//! SQLite-backed privacy store

use super::types::{AuditLogEntry, ConsentRecord, ConsentUpdate, NewAuditEntry, PrivacyPolicy};
use super::PrivacyStore;
use crate::error::{LinkError, Result};
use crate::storage::{format_timestamp, parse_timestamp, SqliteDatabase};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::PathBuf;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS user_consents (
    user_id TEXT PRIMARY KEY,
    ai_processing_consent INTEGER NOT NULL DEFAULT 0,
    data_anonymization_consent INTEGER NOT NULL DEFAULT 0,
    policy_version TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS audit_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    action TEXT NOT NULL,
    resource TEXT NOT NULL,
    details JSON NOT NULL,
    ip_address TEXT,
    user_agent TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_logs_user ON audit_logs (user_id, created_at);
";

/// [`PrivacyStore`] persisted in SQLite
#[derive(Debug, Clone)]
pub struct SqlitePrivacyStore {
    db: SqliteDatabase,
    policy: PrivacyPolicy,
}

impl SqlitePrivacyStore {
    /// Open the store in the application data directory
    pub fn new(policy: PrivacyPolicy) -> Result<Self> {
        Ok(Self {
            db: SqliteDatabase::open_default("privacy.db", SCHEMA)?,
            policy,
        })
    }

    /// Open the store at a specific path
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P, policy: PrivacyPolicy) -> Result<Self> {
        Ok(Self {
            db: SqliteDatabase::new_with_path(db_path, SCHEMA)?,
            policy,
        })
    }
}

fn storage_err(context: &str) -> impl Fn(rusqlite::Error) -> LinkError + '_ {
    move |e| LinkError::Storage(format!("{}: {}", context, e))
}

fn load_consent(conn: &Connection, user_id: &str) -> Result<Option<ConsentRecord>> {
    let row = conn
        .query_row(
            "SELECT ai_processing_consent, data_anonymization_consent, policy_version,
                    created_at, updated_at
             FROM user_consents WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, bool>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()
        .map_err(storage_err("Failed to query consent"))?;

    let Some((ai, anonymize, policy_version, created_at, updated_at)) = row else {
        return Ok(None);
    };

    Ok(Some(ConsentRecord {
        user_id: user_id.to_string(),
        ai_processing_consent: ai,
        data_anonymization_consent: anonymize,
        policy_version,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    }))
}

fn save_consent(conn: &Connection, record: &ConsentRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO user_consents
            (user_id, ai_processing_consent, data_anonymization_consent, policy_version,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
            ai_processing_consent = excluded.ai_processing_consent,
            data_anonymization_consent = excluded.data_anonymization_consent,
            policy_version = excluded.policy_version,
            updated_at = excluded.updated_at",
        params![
            record.user_id,
            record.ai_processing_consent,
            record.data_anonymization_consent,
            record.policy_version,
            format_timestamp(record.created_at),
            format_timestamp(record.updated_at),
        ],
    )
    .map_err(storage_err("Failed to save consent"))?;
    Ok(())
}

/// Read-modify-write a consent record inside one transaction
///
/// The write lock is taken at `BEGIN` so concurrent writers queue on the
/// busy timeout instead of failing a read-to-write lock upgrade.
fn upsert_consent(
    conn: &mut Connection,
    user_id: &str,
    update: &ConsentUpdate,
    policy_version: &str,
) -> Result<ConsentRecord> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(storage_err("Failed to start transaction"))?;

    let mut record = load_consent(&tx, user_id)?
        .unwrap_or_else(|| ConsentRecord::none(user_id, policy_version));
    record.apply(update, policy_version);
    save_consent(&tx, &record)?;

    tx.commit()
        .map_err(storage_err("Failed to commit transaction"))?;
    Ok(record)
}

#[async_trait]
impl PrivacyStore for SqlitePrivacyStore {
    async fn has_ai_processing_consent(&self, user_id: &str) -> Result<bool> {
        Ok(self
            .get_user_consent(user_id)
            .await?
            .is_some_and(|c| c.ai_processing_consent))
    }

    async fn has_data_anonymization_consent(&self, user_id: &str) -> Result<bool> {
        Ok(self
            .get_user_consent(user_id)
            .await?
            .is_some_and(|c| c.data_anonymization_consent))
    }

    async fn log_action(&self, entry: NewAuditEntry) -> Result<()> {
        let entry = entry.into_entry();
        let details = serde_json::to_string(&entry.details)?;
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO audit_logs
                        (id, user_id, action, resource, details, ip_address, user_agent, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        entry.id.to_string(),
                        entry.user_id,
                        entry.action,
                        entry.resource,
                        details,
                        entry.ip_address,
                        entry.user_agent,
                        format_timestamp(entry.created_at),
                    ],
                )
                .map_err(storage_err("Failed to write audit entry"))?;
                Ok(())
            })
            .await
    }

    async fn get_user_consent(&self, user_id: &str) -> Result<Option<ConsentRecord>> {
        let user_id = user_id.to_string();
        self.db.call(move |conn| load_consent(conn, &user_id)).await
    }

    async fn update_user_consent(
        &self,
        user_id: &str,
        update: ConsentUpdate,
    ) -> Result<ConsentRecord> {
        let user_id = user_id.to_string();
        let policy_version = self.policy.version.clone();
        self.db
            .call(move |conn| upsert_consent(conn, &user_id, &update, &policy_version))
            .await
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
        let user_id = user_id.to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, action, resource, details, ip_address, user_agent, created_at
                         FROM audit_logs
                         WHERE user_id = ?1
                         ORDER BY created_at DESC, rowid DESC
                         LIMIT ?2 OFFSET ?3",
                    )
                    .map_err(storage_err("Failed to prepare statement"))?;

                let rows = stmt
                    .query_map(params![user_id, limit, offset], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, Option<String>>(5)?,
                            row.get::<_, String>(6)?,
                        ))
                    })
                    .map_err(storage_err("Failed to query audit logs"))?;

                let mut entries = Vec::new();
                for row in rows {
                    let (id, action, resource, details, ip_address, user_agent, created_at) =
                        row.map_err(storage_err("Failed to read audit row"))?;
                    entries.push(AuditLogEntry {
                        id: Uuid::parse_str(&id).map_err(|e| {
                            LinkError::Storage(format!("Invalid audit id {}: {}", id, e))
                        })?,
                        user_id: user_id.clone(),
                        action,
                        resource,
                        details: serde_json::from_str(&details)?,
                        ip_address,
                        user_agent,
                        created_at: parse_timestamp(&created_at)?,
                    });
                }
                Ok(entries)
            })
            .await
    }

    fn active_policy(&self) -> PrivacyPolicy {
        self.policy.clone()
    }

    async fn health(&self) -> Result<()> {
        self.db.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrivacyConfig;
    use crate::privacy::actions;
    use tempfile::tempdir;

    fn create_test_store() -> (SqlitePrivacyStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = SqlitePrivacyStore::new_with_path(
            dir.path().join("privacy.db"),
            PrivacyPolicy::from(&PrivacyConfig::default()),
        )
        .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_consent() {
        let (store, _dir) = create_test_store();
        assert!(store.get_user_consent("u1").await.unwrap().is_none());
        assert!(!store.has_ai_processing_consent("u1").await.unwrap());
        assert!(!store.has_data_anonymization_consent("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_creates_then_merges() {
        let (store, _dir) = create_test_store();
        let created = store
            .update_user_consent(
                "u1",
                ConsentUpdate {
                    ai_processing_consent: Some(true),
                    data_anonymization_consent: None,
                },
            )
            .await
            .unwrap();
        assert!(created.ai_processing_consent);
        assert!(!created.data_anonymization_consent);
        assert_eq!(created.policy_version, "1.0");

        let merged = store
            .update_user_consent(
                "u1",
                ConsentUpdate {
                    ai_processing_consent: None,
                    data_anonymization_consent: Some(true),
                },
            )
            .await
            .unwrap();
        assert!(merged.ai_processing_consent);
        assert!(merged.data_anonymization_consent);

        let loaded = store.get_user_consent("u1").await.unwrap().unwrap();
        assert_eq!(
            loaded.created_at.timestamp_micros(),
            created.created_at.timestamp_micros()
        );
        assert!(store.has_ai_processing_consent("u1").await.unwrap());
        assert!(store.has_data_anonymization_consent("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_all_consent() {
        let (store, _dir) = create_test_store();
        store
            .update_user_consent(
                "u1",
                ConsentUpdate {
                    ai_processing_consent: Some(true),
                    data_anonymization_consent: Some(true),
                },
            )
            .await
            .unwrap();

        let revoked = store.revoke_all_consent("u1").await.unwrap();
        assert!(!revoked.ai_processing_consent);
        assert!(!revoked.data_anonymization_consent);
        assert!(!store.has_ai_processing_consent("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_audit_logs_newest_first_with_paging() {
        let (store, _dir) = create_test_store();
        for i in 0..3 {
            store
                .log_action(
                    NewAuditEntry::new("u1", actions::AI_SUMMARY_GENERATED, format!("r{}", i))
                        .with_details(serde_json::json!({ "n": i }))
                        .with_client(Some("127.0.0.1".to_string()), Some("test".to_string())),
                )
                .await
                .unwrap();
        }
        store
            .log_action(NewAuditEntry::new("u2", actions::CONSENT_REVOKED, "x"))
            .await
            .unwrap();

        let logs = store.get_user_audit_logs("u1", 10, 0).await.unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].resource, "r2");
        assert_eq!(logs[2].resource, "r0");
        assert_eq!(logs[0].details["n"], 2);
        assert_eq!(logs[0].ip_address.as_deref(), Some("127.0.0.1"));

        let page = store.get_user_audit_logs("u1", 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].resource, "r1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consent_updates_all_succeed() {
        let (store, _dir) = create_test_store();

        let mut handles = Vec::new();
        for i in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_user_consent(
                        &format!("u{}", i),
                        ConsentUpdate {
                            ai_processing_consent: Some(true),
                            data_anonymization_consent: Some(i % 2 == 0),
                        },
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for i in 0..64 {
            let record = store
                .get_user_consent(&format!("u{}", i))
                .await
                .unwrap()
                .unwrap();
            assert!(record.ai_processing_consent);
            assert_eq!(record.data_anonymization_consent, i % 2 == 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_for_one_user_merge() {
        let (store, _dir) = create_test_store();

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_user_consent(
                        "u1",
                        ConsentUpdate {
                            ai_processing_consent: Some(true),
                            data_anonymization_consent: None,
                        },
                    )
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_user_consent(
                        "u1",
                        ConsentUpdate {
                            ai_processing_consent: None,
                            data_anonymization_consent: Some(true),
                        },
                    )
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let record = store.get_user_consent("u1").await.unwrap().unwrap();
        assert!(record.ai_processing_consent);
        assert!(record.data_anonymization_consent);
    }

    #[tokio::test]
    async fn test_active_policy_and_health() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.active_policy().version, "1.0");
        store.health().await.unwrap();
    }
}
