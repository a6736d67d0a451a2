//! In-memory session store implementation.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::traits::{GameSessionStore, SessionFilter, SessionUpdate};
use crate::game::{GameSession, SessionId};

/// A session store backed by a mutex-protected hash map. Nothing survives
/// a restart.
pub struct InMemoryGameStore {
    sessions: Mutex<HashMap<SessionId, GameSession>>,
}

impl InMemoryGameStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryGameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameSessionStore for InMemoryGameStore {
    async fn create(&self) -> Result<GameSession> {
        let session = GameSession::new();
        self.sessions.lock().insert(session.id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<GameSession>> {
        Ok(self.sessions.lock().get(id).cloned())
    }

    async fn update(
        &self,
        id: &SessionId,
        update: SessionUpdate<'_>,
    ) -> Result<Option<GameSession>> {
        let mut sessions = self.sessions.lock();
        Ok(sessions.get_mut(id).map(|session| {
            update(session);
            session.clone()
        }))
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<GameSession>> {
        let sessions = self.sessions.lock();
        let mut results: Vec<GameSession> = sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();

        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
