//! The persisted game record and the rules that mutate it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::MAX_QUESTIONS;

/// Opaque identifier of a game session. Also used as the client token value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// One accepted question and the model's answer to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Why a session refuses another question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GameStateError {
    #[error("Game is already completed. Please reset to start a new game.")]
    Completed,
    #[error("Maximum questions reached. Please reset to start a new game.")]
    QuestionLimit,
}

/// A single player's game.
///
/// `question_count` always equals `history.len()` and never exceeds
/// [`MAX_QUESTIONS`]; only [`GameSession::record_answer`] and
/// [`GameSession::reset`] change either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_completed: bool,
    pub question_count: u32,
    pub history: Vec<HistoryEntry>,
}

impl GameSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            created_at: now,
            updated_at: now,
            is_active: true,
            is_completed: false,
            question_count: 0,
            history: Vec::new(),
        }
    }

    /// Questions still available before the cap.
    pub fn remaining(&self) -> u32 {
        MAX_QUESTIONS.saturating_sub(self.question_count)
    }

    pub fn is_at_cap(&self) -> bool {
        self.question_count >= MAX_QUESTIONS
    }

    /// Reject a new question when the game is over or out of budget.
    pub fn ensure_can_ask(&self) -> Result<(), GameStateError> {
        if self.is_completed {
            return Err(GameStateError::Completed);
        }
        if self.is_at_cap() {
            return Err(GameStateError::QuestionLimit);
        }
        Ok(())
    }

    /// Append an exchange, bump the counter and close the game at the cap.
    pub fn record_answer(
        &mut self,
        question: &str,
        answer: &str,
    ) -> Result<&HistoryEntry, GameStateError> {
        self.ensure_can_ask()?;

        let now = Utc::now();
        self.history.push(HistoryEntry {
            question: question.to_string(),
            answer: answer.to_string(),
            timestamp: now,
        });
        self.question_count += 1;
        if self.is_at_cap() {
            self.is_completed = true;
        }
        self.updated_at = now;

        debug_assert_eq!(self.question_count as usize, self.history.len());
        Ok(&self.history[self.history.len() - 1])
    }

    /// Start over, keeping the identifier.
    pub fn reset(&mut self) {
        self.history.clear();
        self.question_count = 0;
        self.is_completed = false;
        self.is_active = true;
        self.updated_at = Utc::now();
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}
