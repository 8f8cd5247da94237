//! SQLite backed seen-store.
//!
//! Schema:
//!
//! ```text
//! headlines(url TEXT PRIMARY KEY, title TEXT NOT NULL, first_seen TEXT NOT NULL)
//! markers(key TEXT PRIMARY KEY, set_at TEXT NOT NULL)
//! ```
//!
//! The database runs in WAL mode with `synchronous = FULL`, so a committed
//! insert is on disk before [`SeenStore::add`] returns.

use super::SeenStore;
use crate::error::StoreError;
use crate::models::{HeadlineRecord, SeenEntry};
use crate::utils::ensure_parent_dir;
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Seen-store persisted in a single SQLite file.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteStore {
    /// Open the database at `path`, creating the file and tables if missing.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        ensure_parent_dir(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);
        Self::connect(options, path).await
    }

    /// Create an in-memory store (for testing).
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, StoreError> {
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options, PathBuf::from(":memory:")).await
    }

    async fn connect(options: SqliteConnectOptions, path: PathBuf) -> Result<Self, StoreError> {
        // One connection: the process is the only writer, and an in-memory
        // database lives exactly as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool, path };
        store.run_migrations().await?;
        info!(entries = store.len().await?, "Opened seen-store");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS headlines (
                url TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                first_seen TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS markers (
                key TEXT PRIMARY KEY,
                set_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// What the store remembers about `url`.
    #[cfg(test)]
    pub async fn entry(&self, url: &str) -> Result<Option<SeenEntry>, StoreError> {
        let row = sqlx::query_as::<_, SeenEntry>(
            "SELECT title, first_seen FROM headlines WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

impl SeenStore for SqliteStore {
    async fn has(&self, url: &str) -> Result<bool, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT url FROM headlines WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn add(&mut self, record: &HeadlineRecord) -> Result<bool, StoreError> {
        let entry = SeenEntry::now(&record.title);
        let result = sqlx::query(
            "INSERT OR IGNORE INTO headlines (url, title, first_seen) VALUES (?, ?, ?)",
        )
        .bind(&record.url)
        .bind(&entry.title)
        .bind(entry.first_seen)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        debug!(url = %record.url, inserted, "Recorded headline");
        Ok(inserted)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM headlines")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 as usize)
    }

    async fn has_marker(&self, key: &str) -> Result<bool, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT key FROM markers WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn set_marker(&mut self, key: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO markers (key, set_at) VALUES (?, ?)")
            .bind(key)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        debug!(key, "Marker set");
        Ok(())
    }
}
