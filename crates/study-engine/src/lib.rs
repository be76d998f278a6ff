//! Adaptive study-session engine.
//!
//! This crate holds the parts of a flashcard and self-test trainer that carry
//! real rules: when a card is due, how mastery moves, which cards a study mode
//! shows, whether an answer counts, and how a quiz or test turns into a score.
//!
//! # Features
//!
//! - **Mastery Scheduling**: Six-box spaced repetition with a full reset on a miss
//! - **Session Filtering**: Standard, Learn and Review card selection
//! - **Answer Evaluation**: Exact matching for closed sets, lenient matching for free text
//! - **Session Scoring**: Quiz and Test state machines with manual overrides
//! - **Result Ledger**: Append-only result history per study set
//!
//! Storage and content generation are collaborators behind the
//! [`StudySetStore`] and [`ContentGenerator`] traits. Every operation that
//! depends on the clock takes `now` as an argument.

pub mod error;
pub mod evaluator;
pub mod filter;
pub mod generator;
pub mod ledger;
pub mod models;
pub mod scheduler;
pub mod scorer;
pub mod session;
pub mod shuffle;
pub mod stats;
pub mod store;

// Re-exports
pub use error::{EngineError, EngineResult};
pub use evaluator::is_correct;
pub use filter::{select_cards, StudyMode};
pub use generator::{create_study_set, ContentGenerator, GeneratedContent, GenerationError};
pub use ledger::{History, ResultLedger};
pub use models::{
    CardId, Difficulty, Flashcard, MasteryLevel, Question, QuestionId, QuestionKind,
    SessionMode, SessionResult, SetId, StudySet,
};
pub use scheduler::{interval_days, review_card};
pub use scorer::{ScorerState, SessionScorer, Verdict};
pub use session::{FlashcardSession, QuizLauncher, TestLauncher};
pub use stats::SetStats;
pub use store::{commit_review, record_result, MemoryStore, StoreLedger, StudySetStore};
