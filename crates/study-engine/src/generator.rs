//! Content generation seam.
//!
//! Flashcards, questions and study guides come from an external generator.
//! The engine only sees its structured output and turns it into owned
//! entities with fresh ids and fresh scheduling state.

use crate::error::{EngineError, EngineResult};
use crate::models::{Difficulty, Flashcard, Question, QuestionKind, StudySet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Source text beyond this many characters is not sent to a generator.
pub const MAX_SOURCE_CHARS: usize = 50_000;

/// Generator failures. Callers keep whatever content they already had.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The generation service failed.
    #[error("Generation service error: {0}")]
    Service(String),

    /// The service answered with content that could not be used.
    #[error("Malformed generated content: {0}")]
    Malformed(String),
}

/// Generated flashcard, before it gets an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCard {
    pub front: String,
    pub back: String,
}

/// Generated question, before it gets an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub expected_answer: String,
    #[serde(default)]
    pub explanation: String,
}

impl GeneratedQuestion {
    /// Assign an id.
    pub fn into_question(self) -> Question {
        let mut question = Question::new(self.kind, self.prompt, self.expected_answer)
            .with_explanation(self.explanation);
        question.options = self.options;
        question
    }
}

/// Everything a generator returns for a new set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeneratedContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub flashcards: Vec<GeneratedCard>,
    #[serde(default)]
    pub questions: Vec<GeneratedQuestion>,
    #[serde(default)]
    pub study_guide: String,
}

/// External content generator.
pub trait ContentGenerator {
    /// Generate a full study set from source text.
    fn generate(
        &self,
        source_text: &str,
        difficulty: Difficulty,
    ) -> Result<GeneratedContent, GenerationError>;

    /// Generate `count` fresh questions from source text.
    fn generate_questions(
        &self,
        source_text: &str,
        count: usize,
        difficulty: Difficulty,
    ) -> Result<Vec<GeneratedQuestion>, GenerationError>;
}

/// First [`MAX_SOURCE_CHARS`] characters of the source.
pub fn truncate_source(text: &str) -> &str {
    match text.char_indices().nth(MAX_SOURCE_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Give generated questions ids.
pub fn into_questions(generated: Vec<GeneratedQuestion>) -> Vec<Question> {
    generated
        .into_iter()
        .map(GeneratedQuestion::into_question)
        .collect()
}

/// Build a set from already generated content.
///
/// A blank `title` falls back to the generated one. Every card starts in box
/// 0 and is due at `now`.
pub fn import_generated(
    title: &str,
    source_text: Option<&str>,
    content: GeneratedContent,
    now: DateTime<Utc>,
) -> StudySet {
    let title = if title.trim().is_empty() {
        content.title.trim()
    } else {
        title.trim()
    };
    let mut set = StudySet::new(title, now)
        .with_description(content.description)
        .with_tags(content.tags);
    if let Some(text) = source_text {
        set = set.with_source_text(text);
    }
    set.flashcards = content
        .flashcards
        .into_iter()
        .map(|card| Flashcard::new(card.front, card.back, now))
        .collect();
    set.questions = into_questions(content.questions);
    set.study_guide = content.study_guide;
    set
}

/// Create a set by sending source text through a generator.
pub fn create_study_set<G>(
    generator: &G,
    title: &str,
    source_text: &str,
    now: DateTime<Utc>,
) -> EngineResult<StudySet>
where
    G: ContentGenerator + ?Sized,
{
    if title.trim().is_empty() || source_text.trim().is_empty() {
        return Err(EngineError::InvalidInput(
            "Please provide both a title and study notes".to_string(),
        ));
    }
    let content = generator.generate(truncate_source(source_text), Difficulty::Medium)?;
    let set = import_generated(title, Some(source_text), content, now);
    info!(
        set = %set.id,
        cards = set.flashcards.len(),
        questions = set.questions.len(),
        "created study set"
    );
    Ok(set)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Generator returning canned content, or failing on demand.
    #[derive(Default)]
    pub struct StubGenerator {
        pub content: GeneratedContent,
        pub fail: bool,
        pub calls: RefCell<Vec<(usize, Difficulty, usize)>>,
    }

    impl StubGenerator {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }
    }

    pub fn generated_tf(prompt: &str) -> GeneratedQuestion {
        GeneratedQuestion {
            kind: QuestionKind::TrueFalse,
            prompt: prompt.to_string(),
            options: None,
            expected_answer: "True".to_string(),
            explanation: String::new(),
        }
    }

    impl ContentGenerator for StubGenerator {
        fn generate(
            &self,
            source_text: &str,
            difficulty: Difficulty,
        ) -> Result<GeneratedContent, GenerationError> {
            self.calls
                .borrow_mut()
                .push((source_text.chars().count(), difficulty, 0));
            if self.fail {
                return Err(GenerationError::Service("quota exceeded".to_string()));
            }
            Ok(self.content.clone())
        }

        fn generate_questions(
            &self,
            source_text: &str,
            count: usize,
            difficulty: Difficulty,
        ) -> Result<Vec<GeneratedQuestion>, GenerationError> {
            self.calls
                .borrow_mut()
                .push((source_text.chars().count(), difficulty, count));
            if self.fail {
                return Err(GenerationError::Service("quota exceeded".to_string()));
            }
            Ok((0..count)
                .map(|i| generated_tf(&format!("Generated {i}")))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn content() -> GeneratedContent {
        GeneratedContent {
            title: "Cells".to_string(),
            description: "Cell biology basics".to_string(),
            tags: vec!["biology".to_string()],
            flashcards: vec![GeneratedCard {
                front: "Powerhouse of the cell".to_string(),
                back: "Mitochondria".to_string(),
            }],
            questions: vec![generated_tf("Cells have membranes")],
            study_guide: "# Cells".to_string(),
        }
    }

    #[test]
    fn test_create_study_set() {
        let generator = StubGenerator {
            content: content(),
            ..StubGenerator::default()
        };
        let now = Utc::now();
        let set = create_study_set(&generator, "Bio 101", "Cells are small.", now).unwrap();

        assert_eq!(set.title, "Bio 101");
        assert_eq!(set.description, "Cell biology basics");
        assert_eq!(set.flashcards.len(), 1);
        assert!(set.flashcards[0].mastery.is_new());
        assert_eq!(set.flashcards[0].next_review_at, now);
        assert_eq!(set.questions.len(), 1);
        assert_eq!(set.source_text.as_deref(), Some("Cells are small."));
        assert_eq!(generator.calls.borrow()[0].1, Difficulty::Medium);
    }

    #[test]
    fn test_create_requires_title_and_text() {
        let generator = StubGenerator::default();
        assert!(matches!(
            create_study_set(&generator, " ", "text", Utc::now()),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(create_study_set(&generator, "Title", "", Utc::now()).is_err());
        assert!(generator.calls.borrow().is_empty());
    }

    #[test]
    fn test_generation_failure_surfaces() {
        let generator = StubGenerator::failing();
        assert!(matches!(
            create_study_set(&generator, "T", "notes", Utc::now()),
            Err(EngineError::Generation(_))
        ));
    }

    #[test]
    fn test_source_truncated() {
        let generator = StubGenerator {
            content: content(),
            ..StubGenerator::default()
        };
        let long = "é".repeat(MAX_SOURCE_CHARS + 10);
        let set = create_study_set(&generator, "Long", &long, Utc::now()).unwrap();
        assert_eq!(generator.calls.borrow()[0].0, MAX_SOURCE_CHARS);
        // The stored text is kept whole.
        assert_eq!(set.source_text.unwrap().chars().count(), MAX_SOURCE_CHARS + 10);
    }

    #[test]
    fn test_import_uses_generated_title_when_blank() {
        let set = import_generated("", None, content(), Utc::now());
        assert_eq!(set.title, "Cells");
        assert!(!set.has_source_text());
    }

    #[test]
    fn test_generated_content_from_json() {
        let json = r#"{
            "title": "T",
            "flashcards": [{"front": "a", "back": "b"}],
            "questions": [{
                "type": "multiple-choice",
                "prompt": "Pick",
                "options": ["x", "y"],
                "expected_answer": "x"
            }]
        }"#;
        let content: GeneratedContent = serde_json::from_str(json).unwrap();
        let questions = into_questions(content.questions);
        assert_eq!(questions[0].kind, QuestionKind::MultipleChoice);
        assert_eq!(questions[0].options.as_ref().unwrap().len(), 2);
    }
}
