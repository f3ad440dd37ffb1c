//! `SQLite`-backed implementation of [`StateBackend`].
//!
//! Uses a single `Mutex<Connection>` for thread safety.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use ilevel_types::state::{SyncState, Watermark};
use ilevel_types::stream::StreamName;
use rusqlite::{Connection, OptionalExtension};

use crate::backend::StateBackend;
use crate::error::{self, StateError};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Idempotent DDL for state tables.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS bookmarks (
    stream TEXT PRIMARY KEY,
    watermark TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS sync_status (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    currently_syncing TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// `SQLite`-backed state storage.
///
/// Create with [`SqliteStateBackend::open`] for file-backed persistence
/// or [`SqliteStateBackend::in_memory`] for tests.
pub struct SqliteStateBackend {
    conn: Mutex<Connection>,
    label: String,
}

impl SqliteStateBackend {
    /// Open or create a `SQLite` state database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
            label: format!("sqlite:{}", path.display()),
        })
    }

    /// Create an in-memory `SQLite` backend (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Sqlite`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
            label: "sqlite::memory:".to_string(),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Format current UTC time for `SQLite` storage.
    fn now_sqlite() -> String {
        Utc::now().format(SQLITE_DATETIME_FMT).to_string()
    }
}

impl StateBackend for SqliteStateBackend {
    fn load(&self) -> error::Result<SyncState> {
        let conn = self.lock_conn()?;
        let mut state = SyncState::default();

        let mut stmt = conn.prepare("SELECT stream, watermark FROM bookmarks ORDER BY stream")?;
        let rows = stmt.query_map([], |row| {
            let stream: String = row.get(0)?;
            let watermark: String = row.get(1)?;
            Ok((stream, watermark))
        })?;
        for row in rows {
            let (stream, raw) = row?;
            let watermark = Watermark::parse(&raw).ok_or_else(|| {
                StateError::Corrupt(format!("bookmark '{stream}' has watermark '{raw}'"))
            })?;
            state.bookmarks.insert(StreamName::new(stream), watermark);
        }

        state.currently_syncing = conn
            .query_row(
                "SELECT currently_syncing FROM sync_status WHERE id = 1",
                [],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten()
            .map(StreamName::new);

        Ok(state)
    }

    fn persist(&self, state: &SyncState) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let now = Self::now_sqlite();
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM bookmarks", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO bookmarks (stream, watermark, updated_at) VALUES (?1, ?2, ?3)",
            )?;
            for (stream, watermark) in &state.bookmarks {
                stmt.execute(rusqlite::params![
                    stream.as_str(),
                    watermark.to_string(),
                    now
                ])?;
            }
        }
        tx.execute(
            "INSERT INTO sync_status (id, currently_syncing, updated_at) VALUES (1, ?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET currently_syncing = ?1, updated_at = ?2",
            rusqlite::params![state.currently_syncing.as_ref().map(StreamName::as_str), now],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
