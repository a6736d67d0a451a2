//! Question Validator: cheap checks run before anything reaches the model.

/// Shortest accepted question, measured after trimming.
pub const MIN_QUESTION_CHARS: usize = 3;
/// Longest accepted question, measured on the raw input.
pub const MAX_QUESTION_CHARS: usize = 500;

const DENYLIST: [&str; 4] = ["fuck", "shit", "damn", "hell"];

/// Why a question was turned away. The `Display` text is shown to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuestionRejection {
    #[error("Question is required")]
    Empty,
    #[error("Question is too short")]
    TooShort,
    #[error("Question is too long (max 500 characters)")]
    TooLong,
    #[error("Please keep questions appropriate")]
    Inappropriate,
}

/// Validate a player's question.
pub fn validate_question(question: &str) -> Result<(), QuestionRejection> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(QuestionRejection::Empty);
    }
    if trimmed.chars().count() < MIN_QUESTION_CHARS {
        return Err(QuestionRejection::TooShort);
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(QuestionRejection::TooLong);
    }

    let lowered = question.to_lowercase();
    if DENYLIST.iter().any(|word| lowered.contains(word)) {
        return Err(QuestionRejection::Inappropriate);
    }

    Ok(())
}
