//! Session management: game session persistence and the client-token binding.

pub mod in_memory;
pub mod manager;
pub mod sqlite;
pub mod traits;

pub use in_memory::InMemoryGameStore;
pub use manager::{RecordOutcome, SessionManager};
pub use sqlite::SqliteGameStore;
pub use traits::{GameSessionStore, SessionFilter, SessionUpdate};

use crate::config::{Config, StorageConfig};
use crate::game::{GameSession, SessionId};
use anyhow::{Context, Result};
use std::fmt::Write;
use std::sync::Arc;

/// Factory: create the session store selected by `[storage]`.
pub async fn create_session_store(
    config: &StorageConfig,
) -> Result<Arc<dyn GameSessionStore>> {
    match config.backend.trim().to_ascii_lowercase().as_str() {
        "sqlite" => Ok(Arc::new(SqliteGameStore::open(&config.path).await?)),
        "memory" => Ok(Arc::new(InMemoryGameStore::new())),
        other => anyhow::bail!(
            "Unknown storage backend: {other}. Supported backends: \"sqlite\", \"memory\"."
        ),
    }
}

fn format_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn render_session_table(sessions: &[GameSession]) -> String {
    let mut out = format!(
        "{:<36}  {:>9}  {:<9}  {:<6}  {:<19}  {:<19}\n",
        "SESSION", "QUESTIONS", "COMPLETED", "ACTIVE", "CREATED", "UPDATED"
    );
    for session in sessions {
        let _ = writeln!(
            out,
            "{:<36}  {:>9}  {:<9}  {:<6}  {:<19}  {:<19}",
            session.id,
            session.question_count,
            if session.is_completed { "yes" } else { "no" },
            if session.is_active { "yes" } else { "no" },
            format_timestamp(&session.created_at),
            format_timestamp(&session.updated_at),
        );
    }
    out
}

fn render_session_detail(session: &GameSession) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Session:    {}", session.id);
    let _ = writeln!(out, "Questions:  {}", session.question_count);
    let _ = writeln!(out, "Completed:  {}", session.is_completed);
    let _ = writeln!(out, "Active:     {}", session.is_active);
    let _ = writeln!(out, "Created:    {}", format_timestamp(&session.created_at));
    let _ = writeln!(out, "Updated:    {}", format_timestamp(&session.updated_at));
    if session.history.is_empty() {
        out.push_str("\nNo questions asked yet.\n");
        return out;
    }
    out.push('\n');
    for (i, entry) in session.history.iter().enumerate() {
        let n = i + 1;
        let _ = writeln!(out, "Q{n}: {}", entry.question);
        let _ = writeln!(out, "A{n}: {}", entry.answer);
    }
    out
}

fn parse_session_id(raw: &str) -> Result<SessionId> {
    raw.parse()
        .with_context(|| format!("Invalid session id: {raw}"))
}

/// Administrative `guessmaster sessions ...` commands.
pub async fn handle_session_command(command: crate::SessionCommands, config: &Config) -> Result<()> {
    let store = create_session_store(&config.storage).await?;
    match command {
        crate::SessionCommands::List {
            active,
            completed,
            limit,
        } => {
            let filter = SessionFilter {
                active: active.then_some(true),
                completed: completed.then_some(true),
                limit: Some(limit),
            };
            let sessions = store.list(&filter).await?;
            if sessions.is_empty() {
                println!("No game sessions found.");
                return Ok(());
            }
            println!("Game sessions ({} shown, newest first):\n", sessions.len());
            print!("{}", render_session_table(&sessions));
        }
        crate::SessionCommands::Show { id } => {
            let id = parse_session_id(&id)?;
            match store.get(&id).await? {
                Some(session) => print!("{}", render_session_detail(&session)),
                None => println!("No game session found with id: {id}"),
            }
        }
        crate::SessionCommands::Reset { id } => {
            let id = parse_session_id(&id)?;
            let manager = SessionManager::new(store);
            match manager.reset_by_id(&id).await? {
                Some(session) => println!("Game session {} reset.", session.id),
                None => println!("No game session found with id: {id}"),
            }
        }
    }
    Ok(())
}
