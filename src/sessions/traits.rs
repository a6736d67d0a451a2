//! Game session repository traits and types.

use anyhow::Result;
use async_trait::async_trait;

use crate::game::{GameSession, SessionId};

/// Filter criteria for listing sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub active: Option<bool>,
    pub completed: Option<bool>,
    pub limit: Option<usize>,
}

impl SessionFilter {
    pub fn matches(&self, session: &GameSession) -> bool {
        if let Some(active) = self.active {
            if session.is_active != active {
                return false;
            }
        }
        if let Some(completed) = self.completed {
            if session.is_completed != completed {
                return false;
            }
        }
        true
    }
}

/// A pure edit applied to a stored session.
pub type SessionUpdate<'a> = &'a mut (dyn FnMut(&mut GameSession) + Send);

/// Persistent storage for game sessions.
///
/// Stores know nothing about game rules: callers hand [`update`](Self::update)
/// a function and the store loads, applies and writes back the record.
#[async_trait]
pub trait GameSessionStore: Send + Sync {
    /// Create and persist a fresh session.
    async fn create(&self) -> Result<GameSession>;

    /// Get a session by id, if it exists.
    async fn get(&self, id: &SessionId) -> Result<Option<GameSession>>;

    /// Apply `update` to the stored session and persist it.
    /// Returns `None` when no session has this id.
    async fn update(&self, id: &SessionId, update: SessionUpdate<'_>)
        -> Result<Option<GameSession>>;

    /// List sessions matching the filter, newest first.
    async fn list(&self, filter: &SessionFilter) -> Result<Vec<GameSession>>;

    /// The name of this store implementation.
    fn name(&self) -> &str;
}
