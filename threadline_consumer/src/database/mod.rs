pub mod memory;
pub mod models;
pub mod repositories;

use crate::error::StoreError;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use memory::MemoryStore;
pub use repositories::Repositories;

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;

    CREATE TABLE IF NOT EXISTS documents (
        bucket TEXT NOT NULL,
        id TEXT NOT NULL,
        body TEXT NOT NULL,
        PRIMARY KEY (bucket, id)
    );

    CREATE TABLE IF NOT EXISTS counters (
        bucket TEXT NOT NULL,
        key TEXT NOT NULL,
        value INTEGER NOT NULL,
        PRIMARY KEY (bucket, key)
    );
"#;

/// Key/value document store partitioned into named buckets ("User", "Thread",
/// "Comment"). Documents are opaque JSON strings at this level; the typed view
/// lives in [`Repositories`].
///
/// Every document is last-write-wins. Callers that process messages in parallel
/// must serialize writes to the same id themselves.
pub trait EntityStore: Send + Sync {
    fn get(&self, bucket: &str, id: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, bucket: &str, id: &str, body: &str) -> Result<(), StoreError>;

    /// Inserts only when `id` is absent. Returns `false` if a document already exists.
    fn add(&self, bucket: &str, id: &str, body: &str) -> Result<bool, StoreError>;

    /// Returns `true` if a document was deleted.
    fn remove(&self, bucket: &str, id: &str) -> Result<bool, StoreError>;

    /// Atomically bumps a per-bucket counter. A missing counter is created at
    /// `initial`, which is also the value returned.
    fn increment(&self, bucket: &str, key: &str, delta: u64, initial: u64)
        -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    newly_created: bool,
}

impl Database {
    pub fn connect(path: &Path, operation_timeout: Duration) -> Result<Self> {
        tracing::info!(path = %path.display(), "connecting to document store");
        let newly_created = !path.exists();
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store at {}", path.display()))?;
        conn.busy_timeout(operation_timeout)?;
        Ok(Self::from_connection(conn, newly_created))
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            newly_created,
        }
    }

    /// Applies the schema. Returns whether the database file was created by this process.
    pub fn ensure_migrations(&self) -> Result<bool> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        guard
            .execute_batch(MIGRATIONS)
            .context("failed to apply store migrations")?;
        Ok(self.newly_created)
    }

    fn with_conn<T, F>(&self, bucket: &str, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("database mutex poisoned".into()))?;
        f(&guard).map_err(|err| classify(err, bucket, op))
    }
}

/// SQLITE_BUSY/LOCKED surface once `busy_timeout` expires.
fn classify(err: rusqlite::Error, bucket: &str, op: &'static str) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => StoreError::Timeout {
            bucket: bucket.to_string(),
            op,
        },
        _ => StoreError::from(err),
    }
}

impl EntityStore for Database {
    fn get(&self, bucket: &str, id: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(bucket, "get", |conn| {
            conn.query_row(
                "SELECT body FROM documents WHERE bucket = ?1 AND id = ?2",
                params![bucket, id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    fn set(&self, bucket: &str, id: &str, body: &str) -> Result<(), StoreError> {
        self.with_conn(bucket, "set", |conn| {
            conn.execute(
                r#"
                INSERT INTO documents (bucket, id, body)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(bucket, id) DO UPDATE SET body = excluded.body
                "#,
                params![bucket, id, body],
            )?;
            Ok(())
        })
    }

    fn add(&self, bucket: &str, id: &str, body: &str) -> Result<bool, StoreError> {
        self.with_conn(bucket, "add", |conn| {
            let inserted = conn.execute(
                r#"
                INSERT INTO documents (bucket, id, body)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(bucket, id) DO NOTHING
                "#,
                params![bucket, id, body],
            )?;
            Ok(inserted == 1)
        })
    }

    fn remove(&self, bucket: &str, id: &str) -> Result<bool, StoreError> {
        self.with_conn(bucket, "remove", |conn| {
            let deleted = conn.execute(
                "DELETE FROM documents WHERE bucket = ?1 AND id = ?2",
                params![bucket, id],
            )?;
            Ok(deleted > 0)
        })
    }

    fn increment(
        &self,
        bucket: &str,
        key: &str,
        delta: u64,
        initial: u64,
    ) -> Result<u64, StoreError> {
        let value: i64 = self.with_conn(bucket, "increment", |conn| {
            conn.query_row(
                r#"
                INSERT INTO counters (bucket, key, value)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(bucket, key) DO UPDATE SET value = value + ?4
                RETURNING value
                "#,
                params![bucket, key, initial as i64, delta as i64],
                |row| row.get(0),
            )
        })?;
        Ok(value as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_store() -> Database {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        db
    }

    #[test]
    fn add_refuses_existing_ids() {
        let db = setup_store();
        assert!(db.add("Thread", "1", r#"{"a":1}"#).unwrap());
        assert!(!db.add("Thread", "1", r#"{"a":2}"#).unwrap());
        assert_eq!(db.get("Thread", "1").unwrap().as_deref(), Some(r#"{"a":1}"#));

        // buckets are independent namespaces
        assert!(db.add("Comment", "1", "{}").unwrap());
    }

    #[test]
    fn set_overwrites_and_remove_deletes() {
        let db = setup_store();
        db.set("User", "alice", "{}").unwrap();
        db.set("User", "alice", r#"{"x":true}"#).unwrap();
        assert_eq!(db.get("User", "alice").unwrap().as_deref(), Some(r#"{"x":true}"#));
        assert!(db.remove("User", "alice").unwrap());
        assert!(!db.remove("User", "alice").unwrap());
        assert!(db.get("User", "alice").unwrap().is_none());
    }

    #[test]
    fn increment_starts_at_initial_then_adds_delta() {
        let db = setup_store();
        assert_eq!(db.increment("Thread", "ThreadNum", 1, 1).unwrap(), 1);
        assert_eq!(db.increment("Thread", "ThreadNum", 1, 1).unwrap(), 2);
        assert_eq!(db.increment("Thread", "ThreadNum", 5, 1).unwrap(), 7);
        assert_eq!(db.increment("Comment", "CommentNum", 1, 1).unwrap(), 1);
    }
}
