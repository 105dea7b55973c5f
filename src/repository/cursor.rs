//! Durable crawl cursor.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{RepositoryError, Result};
use crate::models::{CrawlCursor, RunState};

const OFFSET_KEY: &str = "offset";
const RUN_STATE_KEY: &str = "run_state";

/// Storage for the crawl position and the operator stop flag.
///
/// One crawl process advances the cursor; any number of other processes may read it
/// or request a stop.
pub trait CursorStore: Send + Sync {
    /// Current cursor. An uninitialized store reports offset 0 in the run state.
    fn get(&self) -> Result<CrawlCursor>;

    /// Move the offset forward by `delta` and commit before returning.
    fn advance(&self, delta: u64) -> Result<CrawlCursor>;

    /// Ask the running crawl to stop at the next page boundary.
    fn request_stop(&self) -> Result<()>;

    /// Clear a stop request.
    fn resume(&self) -> Result<()>;

    /// Start over from offset 0.
    fn reset(&self) -> Result<()>;
}

/// SQLite-backed cursor store.
pub struct SqliteCursorStore {
    db_path: PathBuf,
}

impl SqliteCursorStore {
    pub fn new(db_path: &Path) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS crawl_cursor (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn read_value(conn: &Connection, key: &str) -> Result<Option<String>> {
        Ok(conn
            .query_row(
                "SELECT value FROM crawl_cursor WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }

    fn write_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO crawl_cursor (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn read_cursor(conn: &Connection) -> Result<CrawlCursor> {
        let offset = match Self::read_value(conn, OFFSET_KEY)? {
            Some(v) => v.parse::<u64>().map_err(|_| RepositoryError::Corrupt {
                key: OFFSET_KEY.to_string(),
                value: v.clone(),
            })?,
            None => 0,
        };
        let run_state = match Self::read_value(conn, RUN_STATE_KEY)? {
            Some(v) => RunState::from_str(&v).ok_or_else(|| RepositoryError::Corrupt {
                key: RUN_STATE_KEY.to_string(),
                value: v.clone(),
            })?,
            None => RunState::Run,
        };
        Ok(CrawlCursor { offset, run_state })
    }

    fn set_run_state(&self, state: RunState) -> Result<()> {
        let conn = self.connect()?;
        Self::write_value(&conn, RUN_STATE_KEY, state.as_str())
    }
}

impl CursorStore for SqliteCursorStore {
    fn get(&self) -> Result<CrawlCursor> {
        let conn = self.connect()?;
        Self::read_cursor(&conn)
    }

    fn advance(&self, delta: u64) -> Result<CrawlCursor> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut cursor = Self::read_cursor(&tx)?;
        cursor.offset = cursor.offset.saturating_add(delta);
        Self::write_value(&tx, OFFSET_KEY, &cursor.offset.to_string())?;
        tx.commit()?;
        Ok(cursor)
    }

    fn request_stop(&self) -> Result<()> {
        self.set_run_state(RunState::Stop)
    }

    fn resume(&self) -> Result<()> {
        self.set_run_state(RunState::Run)
    }

    fn reset(&self) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Self::write_value(&tx, OFFSET_KEY, "0")?;
        Self::write_value(&tx, RUN_STATE_KEY, RunState::Run.as_str())?;
        tx.commit()?;
        Ok(())
    }
}

/// In-process cursor store, used by tests and dry runs.
#[derive(Default)]
pub struct MemoryCursorStore {
    cursor: Mutex<CrawlCursor>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(offset: u64) -> Self {
        Self {
            cursor: Mutex::new(CrawlCursor {
                offset,
                run_state: RunState::Run,
            }),
        }
    }

    fn with_cursor<T>(&self, f: impl FnOnce(&mut CrawlCursor) -> T) -> T {
        // A poisoned lock still holds a valid cursor.
        let mut guard = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl CursorStore for MemoryCursorStore {
    fn get(&self) -> Result<CrawlCursor> {
        Ok(self.with_cursor(|c| *c))
    }

    fn advance(&self, delta: u64) -> Result<CrawlCursor> {
        Ok(self.with_cursor(|c| {
            c.offset = c.offset.saturating_add(delta);
            *c
        }))
    }

    fn request_stop(&self) -> Result<()> {
        self.with_cursor(|c| c.run_state = RunState::Stop);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.with_cursor(|c| c.run_state = RunState::Run);
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.with_cursor(|c| *c = CrawlCursor::default());
        Ok(())
    }
}
