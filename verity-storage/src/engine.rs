//! `StorageEngine`: single-writer SQLite persistence. Grounded on
//! `cortex-storage/src/lib.rs`'s module layout and the `StorageEngine` name/role
//! referenced by the teacher's test fixtures (`StorageEngine::open_in_memory()`).
//!
//! Per spec §5/§10.5, all blocking SQLite work is issued through
//! `tokio::task::spawn_blocking`, and a single `Arc<Mutex<Connection>>` acts as the
//! per-row critical section for the read-modify-write mutations spec §5 calls out
//! (`violations`, `confirmations`, `times_tested`, `contradictions`, `state`,
//! `propagated_confidence`, edge strength upserts).

use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use verity_core::errors::StorageError;

use crate::migrations;

#[derive(Clone)]
pub struct StorageEngine {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl StorageEngine {
    /// Open (creating if necessary) a WAL-mode SQLite database at `path`.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory database, used by tests and the `test-fixtures` crate.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON").ok();
        migrations::run(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the shared connection off the async executor,
    /// holding the async mutex for the duration (the store's single writer/critical
    /// section, per spec §5).
    pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        let guard = conn.lock_owned().await;
        tokio::task::spawn_blocking(move || f(&guard))
            .await
            .map_err(|e| StorageError::Concurrency(e.to_string()))?
    }
}
