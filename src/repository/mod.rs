//! Repository layer for SQLite persistence.
//!
//! Two small stores live here: the crawl cursor (read and written by the crawler,
//! read and flagged by `state` commands from other processes) and the read-only
//! product-code lookup consulted when rendering reports.

pub mod cursor;
pub mod products;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

pub use cursor::{CursorStore, MemoryCursorStore, SqliteCursorStore};
pub use products::{DeviceLookup, ProductCodeRepository};

/// How long a connection waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt value for '{key}': {value}")]
    Corrupt { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Open a read-write connection in WAL mode so readers in other processes never
/// block the writer.
pub fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(conn)
}
