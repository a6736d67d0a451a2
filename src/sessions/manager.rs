//! Session Manager: binds client tokens to stored games.
//!
//! The manager is the only writer of [`GameSession`] records. Handlers ask it
//! to resolve, reset or extend a game; it turns those requests into pure
//! update functions for the store.

use anyhow::{Context, Result};
use std::sync::Arc;

use super::traits::GameSessionStore;
use crate::game::{GameSession, GameStateError, SessionId};

/// Outcome of recording an exchange.
#[derive(Debug)]
pub enum RecordOutcome {
    Recorded(GameSession),
    Rejected(GameStateError),
    Missing,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn GameSessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn GameSessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn GameSessionStore> {
        &self.store
    }

    /// Resolve the active session bound to `token`, or start a new one.
    ///
    /// Missing, malformed, unknown and inactive tokens all fall back to
    /// creation; callers must re-bind the returned id.
    pub async fn get_or_create(&self, token: Option<&str>) -> Result<GameSession> {
        if let Some(id) = parse_token(token) {
            if let Some(session) = self.store.get(&id).await? {
                if session.is_active {
                    return Ok(session);
                }
                tracing::debug!(session_id = %id, "Bound session is inactive, starting a new one");
            } else {
                tracing::debug!(session_id = %id, "Bound session not found, starting a new one");
            }
        }

        let session = self
            .store
            .create()
            .await
            .context("Failed to create game session")?;
        tracing::info!(session_id = %session.id, store = self.store.name(), "Game session created");
        Ok(session)
    }

    /// Reset the session bound to `token`, creating one if none resolves.
    /// Inactive sessions are revived by the reset.
    pub async fn reset(&self, token: Option<&str>) -> Result<GameSession> {
        if let Some(id) = parse_token(token) {
            if let Some(session) = self.reset_by_id(&id).await? {
                return Ok(session);
            }
        }

        let session = self
            .store
            .create()
            .await
            .context("Failed to create game session")?;
        tracing::info!(session_id = %session.id, "Reset requested without a session, created one");
        Ok(session)
    }

    /// Reset a session by id. Returns `None` when it does not exist.
    pub async fn reset_by_id(&self, id: &SessionId) -> Result<Option<GameSession>> {
        let reset = self
            .store
            .update(id, &mut |session: &mut GameSession| session.reset())
            .await
            .context("Failed to reset game session")?;
        if reset.is_some() {
            tracing::info!(session_id = %id, "Game session reset");
        }
        Ok(reset)
    }

    /// Append a question/answer pair, enforcing the game rules inside the
    /// store update so the check and the write see the same record.
    pub async fn record_exchange(
        &self,
        id: &SessionId,
        question: &str,
        answer: &str,
    ) -> Result<RecordOutcome> {
        let mut rejection = None;
        let updated = self
            .store
            .update(id, &mut |session: &mut GameSession| {
                if let Err(err) = session.record_answer(question, answer) {
                    rejection = Some(err);
                }
            })
            .await
            .context("Failed to record question and answer")?;

        Ok(match (updated, rejection) {
            (None, _) => RecordOutcome::Missing,
            (Some(_), Some(err)) => RecordOutcome::Rejected(err),
            (Some(session), None) => {
                tracing::debug!(
                    session_id = %session.id,
                    question_count = session.question_count,
                    completed = session.is_completed,
                    "Exchange recorded"
                );
                RecordOutcome::Recorded(session)
            }
        })
    }
}

fn parse_token(token: Option<&str>) -> Option<SessionId> {
    token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .and_then(|t| t.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MAX_QUESTIONS;
    use crate::sessions::InMemoryGameStore;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InMemoryGameStore::new()))
    }

    #[tokio::test]
    async fn get_or_create_without_token_creates() {
        let mgr = manager();
        let session = mgr.get_or_create(None).await.unwrap();
        assert_eq!(session.question_count, 0);
        assert!(session.is_active);
    }

    #[tokio::test]
    async fn get_or_create_resolves_existing_token() {
        let mgr = manager();
        let first = mgr.get_or_create(None).await.unwrap();
        let token = first.id.to_string();

        let second = mgr.get_or_create(Some(&token)).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn stale_or_garbage_token_falls_back_to_creation() {
        let mgr = manager();
        let unknown = SessionId::new().to_string();

        let a = mgr.get_or_create(Some(&unknown)).await.unwrap();
        assert_ne!(a.id.to_string(), unknown);

        let b = mgr.get_or_create(Some("not a token")).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn inactive_session_is_never_returned() {
        let mgr = manager();
        let first = mgr.get_or_create(None).await.unwrap();
        mgr.store()
            .update(&first.id, &mut |s: &mut GameSession| s.is_active = false)
            .await
            .unwrap();

        let next = mgr.get_or_create(Some(&first.id.to_string())).await.unwrap();
        assert_ne!(next.id, first.id);
        assert!(next.is_active);
    }

    #[tokio::test]
    async fn reset_keeps_id_and_clears_state() {
        let mgr = manager();
        let session = mgr.get_or_create(None).await.unwrap();
        mgr.record_exchange(&session.id, "Test", "Test").await.unwrap();

        let reset = mgr.reset(Some(&session.id.to_string())).await.unwrap();
        assert_eq!(reset.id, session.id);
        assert_eq!(reset.question_count, 0);
        assert!(reset.history.is_empty());
        assert!(!reset.is_completed);
        assert!(reset.is_active);
    }

    #[tokio::test]
    async fn reset_without_token_creates() {
        let mgr = manager();
        let session = mgr.reset(None).await.unwrap();
        assert_eq!(session.question_count, 0);
        assert!(mgr.store().get(&session.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn record_exchange_keeps_count_equal_to_history() {
        let mgr = manager();
        let session = mgr.get_or_create(None).await.unwrap();

        for i in 0..5 {
            let outcome = mgr
                .record_exchange(&session.id, &format!("Question {i}?"), "No")
                .await
                .unwrap();
            let RecordOutcome::Recorded(updated) = outcome else {
                panic!("expected exchange to be recorded");
            };
            assert_eq!(updated.question_count as usize, updated.history.len());
        }
    }

    #[tokio::test]
    async fn record_exchange_rejects_after_cap() {
        let mgr = manager();
        let session = mgr.get_or_create(None).await.unwrap();
        for _ in 0..MAX_QUESTIONS {
            mgr.record_exchange(&session.id, "Is it big?", "No").await.unwrap();
        }

        let outcome = mgr
            .record_exchange(&session.id, "Is it small?", "Yes")
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            RecordOutcome::Rejected(GameStateError::Completed)
        ));
    }

    #[tokio::test]
    async fn record_exchange_on_missing_session() {
        let mgr = manager();
        let outcome = mgr
            .record_exchange(&SessionId::new(), "Is it big?", "No")
            .await
            .unwrap();
        assert!(matches!(outcome, RecordOutcome::Missing));
    }
}
