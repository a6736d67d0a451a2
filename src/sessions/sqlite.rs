//! SQLite-backed session store.
//!
//! One row per game in `game_sessions`; the history is stored as a JSON
//! array so a row is always self-contained.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use tokio::sync::Mutex;
use tokio_rusqlite::Connection;

use super::traits::{GameSessionStore, SessionFilter, SessionUpdate};
use crate::game::{GameSession, HistoryEntry, SessionId};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS game_sessions (
    session_id           TEXT PRIMARY KEY NOT NULL,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL,
    is_active            INTEGER NOT NULL DEFAULT 1,
    is_completed         INTEGER NOT NULL DEFAULT 0,
    question_count       INTEGER NOT NULL DEFAULT 0,
    conversation_history TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_game_sessions_created ON game_sessions(created_at);
";

const SELECT_COLUMNS: &str = "session_id, created_at, updated_at, is_active, is_completed, \
                              question_count, conversation_history";

const UPSERT: &str = "INSERT INTO game_sessions
         (session_id, created_at, updated_at, is_active, is_completed,
          question_count, conversation_history)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT(session_id) DO UPDATE SET
         updated_at = excluded.updated_at,
         is_active = excluded.is_active,
         is_completed = excluded.is_completed,
         question_count = excluded.question_count,
         conversation_history = excluded.conversation_history";

/// Queries run on the connection's own background thread, so no SQLite
/// I/O happens on a runtime worker.
pub struct SqliteGameStore {
    conn: Connection,
    /// Serializes load/apply/save in [`GameSessionStore::update`].
    writes: Mutex<()>,
}

impl SqliteGameStore {
    /// Open (or create) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create storage directory: {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .await
            .with_context(|| format!("Failed to open session database: {}", path.display()))?;
        Self::with_connection(conn).await
    }

    /// An anonymous database that lives as long as the store.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .context("Failed to open in-memory session database")?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        conn.call(|conn| conn.execute_batch(SCHEMA))
            .await
            .context("Failed to initialize game_sessions schema")?;
        Ok(Self {
            conn,
            writes: Mutex::new(()),
        })
    }

    async fn load(&self, id: &SessionId) -> Result<Option<GameSession>> {
        let id = id.to_string();
        let raw = self
            .conn
            .call(move |conn| {
                let sql =
                    format!("SELECT {SELECT_COLUMNS} FROM game_sessions WHERE session_id = ?1");
                conn.query_row(&sql, params![id], RawRow::from_row)
                    .optional()
            })
            .await
            .context("Failed to load game session")?;
        raw.map(RawRow::into_session).transpose()
    }

    async fn save(&self, session: &GameSession) -> Result<()> {
        let history = serde_json::to_string(&session.history)
            .context("Failed to serialize conversation history")?;
        let id = session.id.to_string();
        let created_at = session.created_at.to_rfc3339();
        let updated_at = session.updated_at.to_rfc3339();
        let (is_active, is_completed, question_count) =
            (session.is_active, session.is_completed, session.question_count);

        self.conn
            .call(move |conn| {
                conn.execute(
                    UPSERT,
                    params![
                        id,
                        created_at,
                        updated_at,
                        is_active,
                        is_completed,
                        question_count,
                        history,
                    ],
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .context("Failed to save game session")
    }
}

/// Column values as SQLite hands them back, before domain parsing.
struct RawRow {
    id: String,
    created_at: String,
    updated_at: String,
    is_active: bool,
    is_completed: bool,
    question_count: u32,
    history: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            updated_at: row.get(2)?,
            is_active: row.get(3)?,
            is_completed: row.get(4)?,
            question_count: row.get(5)?,
            history: row.get(6)?,
        })
    }

    fn into_session(self) -> Result<GameSession> {
        let history: Vec<HistoryEntry> = serde_json::from_str(&self.history)
            .with_context(|| format!("Corrupt conversation history for session {}", self.id))?;
        Ok(GameSession {
            id: self
                .id
                .parse()
                .with_context(|| format!("Invalid session id in database: {}", self.id))?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            is_active: self.is_active,
            is_completed: self.is_completed,
            question_count: self.question_count,
            history,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp in database: {raw}"))?
        .with_timezone(&Utc))
}

#[async_trait]
impl GameSessionStore for SqliteGameStore {
    async fn create(&self) -> Result<GameSession> {
        let session = GameSession::new();
        self.save(&session).await?;
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<GameSession>> {
        self.load(id).await
    }

    async fn update(
        &self,
        id: &SessionId,
        update: SessionUpdate<'_>,
    ) -> Result<Option<GameSession>> {
        let _guard = self.writes.lock().await;
        let Some(mut session) = self.load(id).await? else {
            return Ok(None);
        };
        update(&mut session);
        self.save(&session).await?;
        Ok(Some(session))
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<GameSession>> {
        let rows = self
            .conn
            .call(|conn| {
                let sql =
                    format!("SELECT {SELECT_COLUMNS} FROM game_sessions ORDER BY created_at DESC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], RawRow::from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await
            .context("Failed to list game sessions")?;

        let mut results = Vec::new();
        for row in rows {
            let session = row.into_session()?;
            if !filter.matches(&session) {
                continue;
            }
            results.push(session);
            if filter.limit.is_some_and(|limit| results.len() >= limit) {
                break;
            }
        }
        Ok(results)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
