//! SQLite persistence for users, exchange keys and the trading journal
//!
//! A single connection behind a mutex, WAL journaling, schema created on open.

mod journal;
mod keys;
mod users;

pub use journal::{JournalEntry, JournalSummary, NewJournalEntry};
pub use keys::ExchangeKeyRecord;
pub use users::{NewUser, User};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database connection lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) the database file
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        // Enable WAL mode for concurrent readers
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self::with_connection(conn)?;
        info!(path = %path.display(), "SQLite store opened");
        Ok(store)
    }

    /// Private in-memory database (tests, offline demos)
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.create_tables()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn create_tables(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                hashed_password TEXT NOT NULL,
                full_name TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS exchange_keys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                exchange_name TEXT NOT NULL,
                api_key TEXT NOT NULL,
                secret_key TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS trading_journal (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                symbol TEXT NOT NULL,
                action TEXT NOT NULL,
                quantity REAL NOT NULL,
                entry_price REAL NOT NULL,
                stop_loss REAL,
                take_profit REAL,
                exit_price REAL,
                exit_reason TEXT,
                pnl REAL,
                pnl_percentage REAL,
                opened_at TEXT NOT NULL,
                closed_at TEXT,
                is_open INTEGER NOT NULL DEFAULT 1,
                notes TEXT,
                ai_confidence REAL,
                ai_reason TEXT,
                strategy_used TEXT,
                order_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_exchange_keys_user ON exchange_keys(user_id, exchange_name);
            CREATE INDEX IF NOT EXISTS idx_journal_user ON trading_journal(user_id, is_open);",
        )?;

        debug!("Database schema created/verified");
        Ok(())
    }

    /// Cheap liveness probe
    pub fn ping(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

pub(crate) fn now_text() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn parse_ts(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_ping() {
        let store = Store::in_memory().unwrap();
        store.ping().unwrap();
    }

    #[test]
    fn test_open_creates_parent_dirs_and_is_idempotent() {
        let dir = std::env::temp_dir().join(format!("deep-signal-test-{}", std::process::id()));
        let path = dir.join("nested").join("app.db");
        {
            let store = Store::open(&path).unwrap();
            store.ping().unwrap();
        }
        let reopened = Store::open(&path).unwrap();
        reopened.ping().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
