//! SQLite plumbing shared by the persistent stores
//!
//! Each operation opens its own connection to the database file and runs on
//! tokio's blocking pool, so the async request path never blocks on disk I/O
//! and no connection is shared between tasks.

use crate::error::{LinkError, Result};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Handle to a SQLite database file with an initialized schema
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    db_path: PathBuf,
}

impl SqliteDatabase {
    /// Open `file_name` in the application data directory, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be determined or created,
    /// or if the schema cannot be applied.
    pub fn open_default(file_name: &str, schema: &str) -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "link", "link-ai")
            .ok_or_else(|| LinkError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join(file_name), schema)
    }

    /// Open the database at `db_path` and apply `schema`
    ///
    /// # Examples
    ///
    /// ```
    /// use link_ai::storage::SqliteDatabase;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let db = SqliteDatabase::new_with_path(
    ///     dir.path().join("test.db"),
    ///     "CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY)",
    /// )
    /// .unwrap();
    /// assert!(db.path().exists());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P, schema: &str) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| LinkError::Storage(e.to_string()))?;
        }

        let database = Self { db_path };
        let conn = database.connect()?;
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| LinkError::Storage(format!("Failed to enable WAL: {}", e)))?;
        tracing::debug!("SQLite journal mode: {}", journal_mode);
        conn.execute_batch(schema)
            .context("Failed to create tables")
            .map_err(|e| LinkError::Storage(e.to_string()))?;

        tracing::debug!("Initialized SQLite database at {}", database.db_path.display());
        Ok(database)
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        open_connection(&self.db_path)
    }

    /// Run `f` with a fresh connection on the blocking thread pool
    ///
    /// # Errors
    ///
    /// Propagates errors from `f`, from opening the connection, or from a
    /// panicked blocking task.
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = open_connection(&db_path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| LinkError::Storage(format!("Database task failed: {}", e)))?
    }

    /// Verify the database answers a trivial query
    pub async fn ping(&self) -> Result<()> {
        self.call(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| LinkError::Storage(format!("Database ping failed: {}", e)))?;
            Ok(())
        })
        .await
    }
}

fn open_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .context("Failed to open database")
        .map_err(|e| LinkError::Storage(e.to_string()))?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| LinkError::Storage(e.to_string()))?;
    Ok(conn)
}

/// Render a timestamp in a fixed-width RFC 3339 form that sorts lexically
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`format_timestamp`]
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LinkError::Storage(format!("Invalid timestamp {}: {}", s, e)).into())
}
