//! SQLite record store for known users and completed checks.
//!
//! `Database` only knows where the file lives. Every webhook request opens its
//! own `Store` handle and drops it when the request finishes.

use rusqlite::{Connection, params};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound for `recent_checks`.
pub const MAX_HISTORY: u32 = 100;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum StoreError {
    /// Failed to open the database file.
    Open { path: PathBuf, source: rusqlite::Error },
    /// Failed to create the tables.
    Schema(rusqlite::Error),
    /// A read or write failed.
    Query(rusqlite::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "failed to open database '{}': {}", path.display(), source)
            }
            Self::Schema(e) => write!(f, "failed to initialize schema: {}", e),
            Self::Query(e) => write!(f, "database query failed: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Schema(e) | Self::Query(e) => Some(e),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Query(e)
    }
}

/// A completed phone-status lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRecord {
    pub id: i64,
    pub chat_id: i64,
    pub number: String,
    pub status: String,
    pub details: String,
    /// Unix seconds.
    pub timestamp: i64,
}

/// Location of the bot database. Cheap to share; opens handles on demand.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create both tables if they are missing.
    pub fn init(&self) -> Result<(), StoreError> {
        let store = self.open()?;
        store
            .conn()
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER UNIQUE,
                username TEXT,
                first_seen INTEGER
            );

            CREATE TABLE IF NOT EXISTS checks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER,
                number TEXT,
                status TEXT,
                details TEXT,
                timestamp INTEGER
            );
        "#,
            )
            .map_err(StoreError::Schema)?;

        let users = store.count_users()?;
        let checks = store.count_checks()?;
        info!("Loaded database from {:?} ({} users, {} checks)", self.path, users, checks);
        Ok(())
    }

    /// Open a handle for one request.
    pub fn open(&self) -> Result<Store, StoreError> {
        let conn = Connection::open(&self.path).map_err(|e| StoreError::Open {
            path: self.path.clone(),
            source: e,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(|e| StoreError::Open {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(Store { conn: Mutex::new(conn) })
    }
}

/// One open connection. Dropping it closes the connection.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert the user unless the chat is already known.
    pub fn record_user(&self, chat_id: i64, username: &str) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO users (chat_id, username, first_seen) VALUES (?1, ?2, ?3)",
            params![chat_id, username, now],
        )?;
        if inserted > 0 {
            info!("👤 New user: {} ({})", username, chat_id);
        }
        Ok(())
    }

    pub fn record_check(&self, chat_id: i64, number: &str, status: &str, details: &str) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        self.conn().execute(
            "INSERT INTO checks (chat_id, number, status, details, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![chat_id, number, status, details, now],
        )?;
        debug!("Recorded check for {} in chat {}: {}", number, chat_id, status);
        Ok(())
    }

    pub fn count_users(&self) -> Result<u64, StoreError> {
        let count: i64 = self.conn().query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn count_checks(&self) -> Result<u64, StoreError> {
        let count: i64 = self.conn().query_row("SELECT COUNT(*) FROM checks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Most recent checks, newest first. `limit` is clamped to 1..=100.
    pub fn recent_checks(&self, limit: u32) -> Result<Vec<CheckRecord>, StoreError> {
        let limit = limit.clamp(1, MAX_HISTORY);
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, number, status, details, timestamp
             FROM checks ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok(CheckRecord {
                id: row.get(0)?,
                chat_id: row.get(1)?,
                number: row.get(2)?,
                status: row.get(3)?,
                details: row.get(4)?,
                timestamp: row.get(5)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every chat that has ever messaged the bot.
    pub fn chat_ids(&self) -> Result<Vec<i64>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT chat_id FROM users ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
