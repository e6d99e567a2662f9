//! Shared local store wrapper used by the engine and clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{Connection, Transaction};
use tokio::sync::Mutex;

use crate::db::queue::QueueRepository;
use crate::db::{Database, QueueStats};
use crate::Result;

/// Thread-safe handle to the local database.
///
/// Every closure passed to [`LocalStore::write`] runs inside one transaction:
/// it commits when the closure returns `Ok` and rolls back otherwise. The
/// lock is released before the call returns, so it is never held across a
/// network request.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open a store at the given filesystem path, creating parent directories.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::open(&db_path)?;
        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run a read-only closure against the connection.
    pub async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send,
        T: Send,
    {
        let db = self.db.lock().await;
        f(db.connection())
    }

    /// Run a closure in a single transaction.
    pub async fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send,
        T: Send,
    {
        let mut db = self.db.lock().await;
        let tx = db.connection_mut().transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        self.read(|conn| QueueRepository::new(conn).stats()).await
    }
}
