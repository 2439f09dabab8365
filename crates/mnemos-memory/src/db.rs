//! The shared SQLite handle.
//!
//! One [`Database`] holds the agent registry, every agent's input and output
//! tables and the vector index, so a multi-table write commits or rolls back
//! as a single transaction.
//!
//! # Fixed tables
//!
//! | table | columns |
//! |---|---|
//! | `mnemos_agents` | `name` (PK), `input_schema`, `output_schema` (JSON), `input_table`, `output_table`, `created_at` (RFC-3339) |
//! | `mnemos_vectors` | `agent`, `id` (PK together), `input_embedding`, `output_embedding` (little-endian f32 BLOBs) |
//!
//! Per-agent tables are created by [`Memory::init`][crate::Memory::init].

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use mnemos_types::{ColumnValue, MnemosError, Result};
use rusqlite::Connection;
use rusqlite::types::{Value as SqlValue, ValueRef};
use tracing::debug;

/// Process-wide SQLite connection, serialized behind a mutex.
pub struct Database {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) a persistent database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| MnemosError::Storage(format!("{}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path).map_err(storage)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(storage)?;
        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        apply_schema(&conn)?;
        debug!(path = ?path, "database ready");
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// File backing this database; `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Acquire the connection mutex.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| MnemosError::Storage(format!("connection lock poisoned: {e}")))
    }
}

fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS mnemos_agents (
            name          TEXT NOT NULL PRIMARY KEY,
            input_schema  TEXT NOT NULL,
            output_schema TEXT NOT NULL,
            input_table   TEXT NOT NULL,
            output_table  TEXT NOT NULL,
            created_at    TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS mnemos_vectors (
            agent            TEXT NOT NULL,
            id               TEXT NOT NULL,
            input_embedding  BLOB NOT NULL,
            output_embedding BLOB NOT NULL,
            PRIMARY KEY (agent, id)
        );",
    )
    .map_err(storage)
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions
// ─────────────────────────────────────────────────────────────────────────────

/// Map a rusqlite failure onto [`MnemosError::Storage`].
pub(crate) fn storage(e: rusqlite::Error) -> MnemosError {
    MnemosError::Storage(e.to_string())
}

pub(crate) fn to_sql(value: &ColumnValue) -> SqlValue {
    match value {
        ColumnValue::Null => SqlValue::Null,
        ColumnValue::Integer(i) => SqlValue::Integer(*i),
        ColumnValue::Real(x) => SqlValue::Real(*x),
        ColumnValue::Text(s) => SqlValue::Text(s.clone()),
    }
}

pub(crate) fn from_sql(value: ValueRef<'_>) -> ColumnValue {
    match value {
        ValueRef::Null => ColumnValue::Null,
        ValueRef::Integer(i) => ColumnValue::Integer(i),
        ValueRef::Real(x) => ColumnValue::Real(x),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            ColumnValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
