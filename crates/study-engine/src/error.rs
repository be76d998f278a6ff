//! Engine error types.

use crate::models::{CardId, QuestionId, SetId};
use thiserror::Error;

/// Errors that can occur in the study engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Test submitted with blank answers.
    #[error("Please answer all questions. {remaining} remaining.")]
    Unanswered { remaining: usize },

    /// Operation not allowed in the scorer's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A session was started with no questions.
    #[error("Session has no questions")]
    EmptySession,

    /// Regeneration needs the set's full source text.
    #[error("Cannot generate new questions because the source text is missing")]
    MissingSourceText,

    /// Caller supplied unusable input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Mastery level outside 0..=5.
    #[error("Invalid mastery level: {0}")]
    InvalidMastery(i64),

    /// Content generator failed.
    #[error("Generation failed: {0}")]
    Generation(#[from] crate::generator::GenerationError),

    /// Study set not found.
    #[error("Study set not found: {0}")]
    SetNotFound(SetId),

    /// Flashcard not found in its set.
    #[error("Card not found: {0}")]
    CardNotFound(CardId),

    /// Question not found in the session.
    #[error("Question not found: {0}")]
    QuestionNotFound(QuestionId),

    /// Persistence collaborator failed.
    #[error("Store error: {0}")]
    Store(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
