//! Data models for study sets.

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifiers.
pub type SetId = Uuid;
pub type CardId = Uuid;
pub type QuestionId = Uuid;

/// Number of characters of source text kept as a preview.
const SNIPPET_CHARS: usize = 100;

/// Spaced repetition box of a flashcard, 0 (new or just failed) to 5.
///
/// Out-of-range values are rejected on construction and on deserialization,
/// so scheduling code never has to re-check the bound.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct MasteryLevel(u8);

impl MasteryLevel {
    /// New or struggling.
    pub const NEW: Self = Self(0);
    /// Fully mastered.
    pub const MAX: Self = Self(5);

    /// Create a level, returning `None` when out of range.
    pub fn new(level: u8) -> Option<Self> {
        (level <= Self::MAX.0).then_some(Self(level))
    }

    /// Raw level.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Whether the card is new or was last answered wrong.
    pub fn is_new(self) -> bool {
        self.0 == 0
    }

    /// One box up, saturating at [`MasteryLevel::MAX`].
    pub fn promoted(self) -> Self {
        Self((self.0 + 1).min(Self::MAX.0))
    }
}

impl TryFrom<u8> for MasteryLevel {
    type Error = EngineError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level).ok_or(EngineError::InvalidMastery(i64::from(level)))
    }
}

impl TryFrom<i64> for MasteryLevel {
    type Error = EngineError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        u8::try_from(level)
            .ok()
            .and_then(Self::new)
            .ok_or(EngineError::InvalidMastery(level))
    }
}

impl From<MasteryLevel> for u8 {
    fn from(level: MasteryLevel) -> Self {
        level.0
    }
}

impl std::fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A flashcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    /// Unique identifier.
    pub id: CardId,
    /// Front content.
    pub front: String,
    /// Back content.
    pub back: String,
    /// Current box.
    #[serde(default)]
    pub mastery: MasteryLevel,
    /// When the card is next due. Missing on load means due now.
    #[serde(default)]
    pub next_review_at: DateTime<Utc>,
    /// When the card was last graded.
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl Flashcard {
    /// Create an unreviewed card, due immediately.
    pub fn new(front: impl Into<String>, back: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            front: front.into(),
            back: back.into(),
            mastery: MasteryLevel::NEW,
            next_review_at: now,
            last_reviewed_at: None,
        }
    }

    /// Whether the due time has been reached.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }
}

/// Question type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    /// Pick one of several options.
    MultipleChoice,
    /// "True" or "False".
    TrueFalse,
    /// Free text.
    ShortAnswer,
}

impl QuestionKind {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "Multiple choice",
            Self::TrueFalse => "True/false",
            Self::ShortAnswer => "Short answer",
        }
    }

    /// Whether answers come from a fixed set of choices.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::MultipleChoice | Self::TrueFalse)
    }
}

/// A quiz or test question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier.
    pub id: QuestionId,
    /// Question type.
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    /// Prompt shown to the learner.
    pub prompt: String,
    /// Choices, for multiple-choice questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// The correct option or text.
    pub expected_answer: String,
    /// Shown after the answer is revealed.
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    /// Create a question with a fresh id.
    pub fn new(
        kind: QuestionKind,
        prompt: impl Into<String>,
        expected_answer: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            prompt: prompt.into(),
            options: None,
            expected_answer: expected_answer.into(),
            explanation: String::new(),
        }
    }

    /// Set options.
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// Set explanation.
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Choices the learner can pick from. True/false questions always offer both.
    pub fn choices(&self) -> Vec<String> {
        match self.kind {
            QuestionKind::TrueFalse => vec!["True".to_string(), "False".to_string()],
            QuestionKind::MultipleChoice => self.options.clone().unwrap_or_default(),
            QuestionKind::ShortAnswer => Vec::new(),
        }
    }
}

/// Difficulty label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "Easy"),
            Self::Medium => write!(f, "Medium"),
            Self::Hard => write!(f, "Hard"),
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(EngineError::InvalidInput(format!("unknown difficulty '{s}'"))),
        }
    }
}

/// Kind of scored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionMode {
    /// One question at a time, revealed immediately.
    Quiz,
    /// All questions answered, then submitted together.
    Test,
}

impl SessionMode {
    /// Difficulty recorded for sessions of this mode.
    pub fn difficulty(&self) -> Difficulty {
        match self {
            Self::Quiz => Difficulty::Medium,
            Self::Test => Difficulty::Hard,
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quiz => write!(f, "Quiz"),
            Self::Test => write!(f, "Test"),
        }
    }
}

impl std::str::FromStr for SessionMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quiz" => Ok(Self::Quiz),
            "test" => Ok(Self::Test),
            _ => Err(EngineError::InvalidInput(format!("unknown session mode '{s}'"))),
        }
    }
}

/// Outcome of a finished quiz or test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    /// When the session was finalized.
    pub date: DateTime<Utc>,
    /// Questions counted correct, overrides included.
    pub score: u32,
    /// Questions in the session.
    pub total_questions: u32,
    /// Difficulty label.
    pub difficulty: Difficulty,
    /// Quiz or Test.
    pub mode: SessionMode,
}

impl SessionResult {
    /// Score as a rounded percentage.
    pub fn percentage(&self) -> u32 {
        if self.total_questions == 0 {
            0
        } else {
            ((f64::from(self.score) / f64::from(self.total_questions)) * 100.0).round() as u32
        }
    }
}

/// A study set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySet {
    /// Unique identifier.
    pub id: SetId,
    /// Set title.
    pub title: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Preview of the source text.
    #[serde(default)]
    pub source_snippet: String,
    /// Full source text, kept for regeneration.
    #[serde(default)]
    pub source_text: Option<String>,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Flashcards in study order.
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
    /// Question bank.
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Result history, oldest first.
    #[serde(default)]
    pub results: Vec<SessionResult>,
    /// Markdown summary of key takeaways.
    #[serde(default)]
    pub study_guide: String,
}

impl StudySet {
    /// Create an empty set.
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            source_snippet: String::new(),
            source_text: None,
            created_at: now,
            tags: Vec::new(),
            flashcards: Vec::new(),
            questions: Vec::new(),
            results: Vec::new(),
            study_guide: String::new(),
        }
    }

    /// Set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Attach source text and derive its snippet.
    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.source_snippet = snippet(&text);
        self.source_text = Some(text);
        self
    }

    /// Set tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the set can regenerate questions.
    pub fn has_source_text(&self) -> bool {
        self.source_text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }

    /// Rename the set. Titles cannot be blank.
    pub fn set_title(&mut self, title: impl Into<String>) -> EngineResult<()> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(EngineError::InvalidInput("title cannot be blank".to_string()));
        }
        self.title = title.trim().to_string();
        Ok(())
    }

    /// Find a card.
    pub fn card(&self, id: CardId) -> Option<&Flashcard> {
        self.flashcards.iter().find(|c| c.id == id)
    }

    /// Append a blank card and return its id.
    pub fn add_card(&mut self, now: DateTime<Utc>) -> CardId {
        let card = Flashcard::new("", "", now);
        let id = card.id;
        self.flashcards.push(card);
        id
    }

    /// Edit a card's text. Scheduling fields are left alone.
    pub fn update_card(
        &mut self,
        id: CardId,
        front: impl Into<String>,
        back: impl Into<String>,
    ) -> EngineResult<()> {
        let card = self
            .flashcards
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(EngineError::CardNotFound(id))?;
        card.front = front.into();
        card.back = back.into();
        Ok(())
    }

    /// Remove a card.
    pub fn remove_card(&mut self, id: CardId) -> EngineResult<Flashcard> {
        let index = self
            .flashcards
            .iter()
            .position(|c| c.id == id)
            .ok_or(EngineError::CardNotFound(id))?;
        Ok(self.flashcards.remove(index))
    }

    /// Replace a card with an updated copy of itself.
    pub fn replace_card(&mut self, card: Flashcard) -> EngineResult<()> {
        let slot = self
            .flashcards
            .iter_mut()
            .find(|c| c.id == card.id)
            .ok_or(EngineError::CardNotFound(card.id))?;
        *slot = card;
        Ok(())
    }

    /// File name used when exporting this set.
    pub fn export_file_name(&self) -> String {
        let stem = self.title.split_whitespace().collect::<Vec<_>>().join("_");
        format!("{stem}_studyforge.json")
    }
}

fn snippet(text: &str) -> String {
    let head: String = text.chars().take(SNIPPET_CHARS).collect();
    format!("{head}...")
}
