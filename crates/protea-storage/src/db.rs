//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex for thread-safe access.
//! The handle is constructed once at startup, shared through `Arc`, and
//! released with [`Database::close`] at shutdown.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use protea_core::error::ProteaError;

use crate::migrations;

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path.
    ///
    /// Configures WAL mode, synchronous=NORMAL, and runs all pending
    /// migrations.
    pub fn new(path: &Path) -> Result<Self, ProteaError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| ProteaError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| ProteaError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, ProteaError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ProteaError::Storage(format!("Failed to open in-memory db: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ProteaError>
    where
        F: FnOnce(&Connection) -> Result<T, ProteaError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ProteaError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Close the connection, flushing the WAL.
    pub fn close(self) -> Result<(), ProteaError> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|e| ProteaError::Storage(format!("Database lock poisoned: {}", e)))?;
        conn.close()
            .map_err(|(_, e)| ProteaError::Storage(format!("Failed to close database: {}", e)))?;
        info!("Database closed");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
