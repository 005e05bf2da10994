//! SQLite persistence for tasks and their variant index.
//!
//! One connection behind a mutex. The coordinator's listener, the CLI and
//! the tests all go through the same [`Database`] handle, so every read and
//! every gated transition is serialized.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, Transaction};

pub mod error;
pub mod migrations;
pub mod task_repo;
pub mod variant_repo;

pub use error::DatabaseError;

/// How long a writer waits on a lock held by another process sharing the
/// same file (e.g. `resizer status` while `resizer submit --wait` runs).
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens or creates the task database at `path`, creating parent
    /// directories and applying pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let db = Self::prepare(conn)?;

        log::info!("Task database opened at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database with the full schema.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Runs `f` inside a transaction that commits only when `f` returns
    /// `Ok((true, _))`. Anything else rolls back.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<(bool, T), DatabaseError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<(bool, T), DatabaseError>,
    {
        let mut conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let tx = conn.transaction()?;
        let (commit, value) = f(&tx)?;
        if commit {
            tx.commit()?;
        }
        Ok((commit, value))
    }
}

/// `~/.resizer/data/resizer.db`, when a home directory is known.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".resizer").join("data").join("resizer.db"))
}
