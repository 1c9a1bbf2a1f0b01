//! Conversation store: per-user transcripts and the list of known users.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, params};
use tracing::info;

use crate::bot::message::{Role, Turn, UserProfile};

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    /// A stored row has a role we don't know.
    CorruptRole(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "database error: {e}"),
            Self::CorruptRole(role) => write!(f, "unknown role in stored turn: {role:?}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            Self::CorruptRole(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

/// Persistence used by the relay.
///
/// Unknown users have an empty history. Writes are last-write-wins; the relay
/// never runs two requests for the same user at once.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_history(&self, user_id: i64) -> Result<Vec<Turn>, StoreError>;
    async fn append_turns(&self, user_id: i64, turns: &[Turn]) -> Result<(), StoreError>;
    async fn reset_history(&self, user_id: i64) -> Result<(), StoreError>;
    async fn list_user_ids(&self) -> Result<Vec<i64>, StoreError>;
    async fn upsert_user(&self, profile: &UserProfile) -> Result<(), StoreError>;
}

/// SQLite-backed store.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Self::from_connection(Connection::open(path)?)?;
        let (turns, users) = db.counts()?;
        info!("Loaded database from {:?} ({} turns, {} users)", path, turns, users);
        Ok(db)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                username TEXT,
                first_name TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_turns_user_id ON turns(user_id, id);
        "#)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn counts(&self) -> Result<(usize, usize), StoreError> {
        let conn = self.lock();
        let turns: i64 = conn.query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))?;
        let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok((turns as usize, users as usize))
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[async_trait]
impl ConversationStore for Database {
    async fn get_history(&self, user_id: i64) -> Result<Vec<Turn>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT role, text FROM turns WHERE user_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (role, text) = row?;
            let role = Role::parse(&role).ok_or(StoreError::CorruptRole(role))?;
            turns.push(Turn { role, text });
        }
        Ok(turns)
    }

    async fn append_turns(&self, user_id: i64, turns: &[Turn]) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let created_at = now();
        for turn in turns {
            tx.execute(
                "INSERT INTO turns (user_id, role, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, turn.role.as_str(), turn.text, created_at],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn reset_history(&self, user_id: i64) -> Result<(), StoreError> {
        let conn = self.lock();
        let removed = conn.execute("DELETE FROM turns WHERE user_id = ?1", params![user_id])?;
        info!("Cleared {} turn(s) for user {}", removed, user_id);
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<i64>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT user_id FROM users ORDER BY user_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let conn = self.lock();
        let ts = now();
        conn.execute(
            "INSERT INTO users (user_id, username, first_name, first_seen, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                username = COALESCE(?2, username),
                first_name = ?3,
                last_seen = ?4",
            params![profile.user_id, profile.username, profile.first_name, ts],
        )?;
        Ok(())
    }
}
