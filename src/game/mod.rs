//! Game rules: the session record and question validation.

pub mod session;
pub mod validator;

pub use session::{GameSession, GameStateError, HistoryEntry, SessionId};
pub use validator::{validate_question, QuestionRejection};

/// Question budget for one game.
pub const MAX_QUESTIONS: u32 = 20;
