//! Session builders.
//!
//! Glue between a [`StudySet`] and the pure components: a cursor over the
//! cards picked for a flashcard session, and launchers that pick the
//! questions for a quiz or test.

use crate::error::{EngineError, EngineResult};
use crate::filter::{select_cards, StudyMode};
use crate::generator::{into_questions, truncate_source, ContentGenerator, GenerationError};
use crate::models::{Difficulty, Flashcard, Question, SetId, StudySet};
use crate::scheduler::review_card;
use crate::scorer::SessionScorer;
use crate::shuffle;
use crate::store::{commit_review, StudySetStore};
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, warn};

/// Questions in a quiz.
pub const DEFAULT_QUIZ_LENGTH: usize = 6;
/// Allowed test lengths.
pub const TEST_LENGTHS: [usize; 4] = [5, 10, 15, 20];
/// Default test length.
pub const DEFAULT_TEST_LENGTH: usize = 10;

/// A pass through the cards picked for one study mode.
#[derive(Debug, Clone)]
pub struct FlashcardSession {
    set_id: SetId,
    mode: StudyMode,
    cards: Vec<Flashcard>,
    cursor: usize,
    flipped: bool,
    finished: bool,
    reviewed: usize,
    correct: usize,
}

impl FlashcardSession {
    /// Pick the cards of `set` for `mode`, in set order.
    pub fn new(set: &StudySet, mode: StudyMode, now: DateTime<Utc>) -> Self {
        let cards = select_cards(&set.flashcards, mode, now);
        debug!(set = %set.id, %mode, cards = cards.len(), "flashcard session");
        Self {
            set_id: set.id,
            mode,
            cards,
            cursor: 0,
            flipped: false,
            finished: false,
            reviewed: 0,
            correct: 0,
        }
    }

    pub fn set_id(&self) -> SetId {
        self.set_id
    }

    pub fn mode(&self) -> StudyMode {
        self.mode
    }

    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Nothing matched the mode.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Zero-based position.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Card in front of the learner.
    pub fn current(&self) -> Option<&Flashcard> {
        if self.finished {
            None
        } else {
            self.cards.get(self.cursor)
        }
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Turn the current card over.
    pub fn flip(&mut self) {
        self.flipped = !self.flipped;
    }

    /// Stepped past the last card.
    pub fn is_finished(&self) -> bool {
        self.finished || self.cards.is_empty()
    }

    /// Cards graded in this pass.
    pub fn reviewed(&self) -> usize {
        self.reviewed
    }

    /// Cards graded correct in this pass.
    pub fn correct(&self) -> usize {
        self.correct
    }

    /// Move to the next card, finishing after the last one.
    pub fn next(&mut self) {
        if self.finished {
            return;
        }
        self.flipped = false;
        if self.cursor + 1 < self.cards.len() {
            self.cursor += 1;
        } else {
            self.finished = true;
        }
    }

    /// Move back one card. Returns whether the cursor moved.
    pub fn prev(&mut self) -> bool {
        if self.finished || self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.flipped = false;
        true
    }

    /// Shuffle the picked cards and start over. Scheduling data is untouched.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        shuffle::shuffle(&mut self.cards, rng);
        self.rewind();
    }

    /// Pick the cards again from the latest state of the set.
    pub fn restart(&mut self, set: &StudySet, now: DateTime<Utc>) {
        self.cards = select_cards(&set.flashcards, self.mode, now);
        self.rewind();
        self.reviewed = 0;
        self.correct = 0;
    }

    /// Grade the current card and move on. Learn mode only.
    ///
    /// Returns the rescheduled card; the caller is expected to persist it
    /// before the next grade.
    pub fn grade(&mut self, was_correct: bool, now: DateTime<Utc>) -> EngineResult<Flashcard> {
        let card = self.gradable()?;
        let updated = review_card(card, was_correct, now);
        self.apply(updated.clone(), was_correct);
        Ok(updated)
    }

    /// Grade the current card, committing it to `store` before moving on.
    ///
    /// The stored card is the one rescheduled. If the store fails the
    /// session stays on the same card.
    pub fn grade_and_commit<S>(
        &mut self,
        store: &mut S,
        was_correct: bool,
        now: DateTime<Utc>,
    ) -> EngineResult<Flashcard>
    where
        S: StudySetStore + ?Sized,
    {
        let card_id = self.gradable()?.id;
        let updated = commit_review(store, self.set_id, card_id, was_correct, now)?;
        self.apply(updated.clone(), was_correct);
        Ok(updated)
    }

    fn gradable(&self) -> EngineResult<&Flashcard> {
        if !self.mode.is_graded() {
            return Err(EngineError::InvalidState(format!(
                "cards are not graded in {} mode",
                self.mode
            )));
        }
        self.current()
            .ok_or_else(|| EngineError::InvalidState("no card to grade".to_string()))
    }

    fn apply(&mut self, updated: Flashcard, was_correct: bool) {
        if let Some(slot) = self.cards.get_mut(self.cursor) {
            *slot = updated;
        }
        self.reviewed += 1;
        if was_correct {
            self.correct += 1;
        }
        self.next();
    }

    fn rewind(&mut self) {
        self.cursor = 0;
        self.flipped = false;
        self.finished = false;
    }
}

/// Starts quizzes.
#[derive(Debug, Clone, Copy)]
pub struct QuizLauncher {
    /// Questions per quiz.
    pub length: usize,
}

impl Default for QuizLauncher {
    fn default() -> Self {
        Self {
            length: DEFAULT_QUIZ_LENGTH,
        }
    }
}

impl QuizLauncher {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    /// Quiz over a random sample of the set's questions.
    pub fn start<R: Rng + ?Sized>(
        &self,
        set: &StudySet,
        rng: &mut R,
    ) -> EngineResult<SessionScorer> {
        let questions = shuffle::sample(&set.questions, self.length, rng);
        SessionScorer::quiz(questions)
    }

    /// Replace an unfinished quiz with freshly generated questions.
    ///
    /// On any failure the scorer is left as it was.
    pub fn regenerate(
        &self,
        scorer: &mut SessionScorer,
        set: &StudySet,
        generator: &dyn ContentGenerator,
    ) -> EngineResult<()> {
        let source = set
            .source_text
            .as_deref()
            .filter(|_| set.has_source_text())
            .ok_or(EngineError::MissingSourceText)?;
        let generated = generator.generate_questions(
            truncate_source(source),
            self.length,
            Difficulty::Medium,
        )?;
        if generated.is_empty() {
            return Err(
                GenerationError::Malformed("generator returned no questions".to_string()).into(),
            );
        }
        scorer.regenerate(into_questions(generated))
    }
}

/// Starts tests.
#[derive(Debug, Clone, Copy)]
pub struct TestLauncher {
    length: usize,
}

impl Default for TestLauncher {
    fn default() -> Self {
        Self {
            length: DEFAULT_TEST_LENGTH,
        }
    }
}

impl TestLauncher {
    /// Launcher for one of the [`TEST_LENGTHS`].
    pub fn new(length: usize) -> EngineResult<Self> {
        if TEST_LENGTHS.contains(&length) {
            Ok(Self { length })
        } else {
            Err(EngineError::InvalidInput(format!(
                "test length must be one of {TEST_LENGTHS:?}, got {length}"
            )))
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Start a test.
    ///
    /// Sets with source text get freshly generated hard questions. Without
    /// source text, without a generator, or when generation fails, the test
    /// samples the set's existing questions instead.
    pub fn start<R: Rng + ?Sized>(
        &self,
        set: &StudySet,
        generator: Option<&dyn ContentGenerator>,
        rng: &mut R,
    ) -> EngineResult<SessionScorer> {
        if let (Some(generator), Some(source)) = (generator, set.source_text.as_deref()) {
            if set.has_source_text() {
                match generator.generate_questions(
                    truncate_source(source),
                    self.length,
                    Difficulty::Hard,
                ) {
                    Ok(generated) if !generated.is_empty() => {
                        return SessionScorer::test(into_questions(generated));
                    }
                    Ok(_) => warn!(set = %set.id, "generator returned no questions, using existing"),
                    Err(e) => warn!(set = %set.id, error = %e, "failed to generate test, using existing"),
                }
            }
        }
        let questions: Vec<Question> = shuffle::sample(&set.questions, self.length, rng);
        SessionScorer::test(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::StubGenerator;
    use crate::models::{MasteryLevel, QuestionKind, SessionMode};
    use crate::scorer::ScorerState;
    use crate::shuffle::seeded;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn set_with_cards(now: DateTime<Utc>) -> StudySet {
        let mut set = StudySet::new("Spanish", now);
        for (i, level) in [0u8, 3, 0, 5].into_iter().enumerate() {
            let mut card = Flashcard::new(format!("word {i}"), format!("palabra {i}"), now);
            card.mastery = MasteryLevel::new(level).unwrap();
            card.next_review_at = now + Duration::days(i64::from(level));
            set.flashcards.push(card);
        }
        set
    }

    fn set_with_questions(count: usize) -> StudySet {
        let mut set = StudySet::new("History", Utc::now());
        set.questions = (0..count)
            .map(|i| Question::new(QuestionKind::ShortAnswer, format!("Q{i}"), format!("A{i}")))
            .collect();
        set
    }

    #[test]
    fn test_learn_session_grading() {
        let now = Utc::now();
        let set = set_with_cards(now);
        let mut session = FlashcardSession::new(&set, StudyMode::Learn, now);
        assert_eq!(session.len(), 2);

        let updated = session.grade(true, now).unwrap();
        assert_eq!(updated.mastery.get(), 1);
        assert_eq!(session.position(), 1);

        session.grade(false, now).unwrap();
        assert!(session.is_finished());
        assert!(session.current().is_none());
        assert_eq!(session.reviewed(), 2);
        assert_eq!(session.correct(), 1);
        assert!(session.grade(true, now).is_err());
    }

    #[test]
    fn test_grading_only_in_learn() {
        let now = Utc::now();
        let set = set_with_cards(now);
        let mut session = FlashcardSession::new(&set, StudyMode::Review, now);
        assert!(matches!(
            session.grade(true, now),
            Err(EngineError::InvalidState(_))
        ));
        assert_eq!(session.position(), 0);
    }

    #[test]
    fn test_navigation() {
        let now = Utc::now();
        let set = set_with_cards(now);
        let mut session = FlashcardSession::new(&set, StudyMode::Standard, now);
        assert!(!session.prev());
        session.flip();
        assert!(session.is_flipped());
        session.next();
        assert!(!session.is_flipped());
        assert!(session.prev());
        for _ in 0..4 {
            session.next();
        }
        assert!(session.is_finished());
    }

    #[test]
    fn test_shuffle_keeps_mastery() {
        let now = Utc::now();
        let set = set_with_cards(now);
        let mut session = FlashcardSession::new(&set, StudyMode::Standard, now);
        session.next();
        session.shuffle(&mut seeded(42));
        assert_eq!(session.position(), 0);

        let mut shuffled = session.cards().to_vec();
        let mut original = set.flashcards.clone();
        shuffled.sort_by_key(|c| c.id);
        original.sort_by_key(|c| c.id);
        assert_eq!(shuffled, original);
    }

    #[test]
    fn test_grade_and_commit() {
        let now = Utc::now();
        let set = set_with_cards(now);
        let mut store = MemoryStore::new();
        store.put(&set).unwrap();

        let mut session = FlashcardSession::new(&set, StudyMode::Learn, now);
        let first = session.current().unwrap().id;
        session.grade_and_commit(&mut store, true, now).unwrap();

        let stored = store.get(set.id).unwrap().unwrap();
        assert_eq!(stored.card(first).unwrap().mastery.get(), 1);

        // Restart sees the committed state: the promoted card is no longer new or due.
        session.restart(&stored, now);
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_commit_failure_keeps_cursor() {
        let now = Utc::now();
        let set = set_with_cards(now);
        let mut empty = MemoryStore::new();
        let mut session = FlashcardSession::new(&set, StudyMode::Learn, now);
        assert!(session.grade_and_commit(&mut empty, true, now).is_err());
        assert_eq!(session.position(), 0);
        assert_eq!(session.reviewed(), 0);
    }

    #[test]
    fn test_quiz_samples() {
        let set = set_with_questions(10);
        let scorer = QuizLauncher::default().start(&set, &mut seeded(1)).unwrap();
        assert_eq!(scorer.questions().len(), DEFAULT_QUIZ_LENGTH);
        assert_eq!(scorer.mode(), SessionMode::Quiz);

        let small = set_with_questions(2);
        let scorer = QuizLauncher::default().start(&small, &mut seeded(1)).unwrap();
        assert_eq!(scorer.questions().len(), 2);

        assert!(QuizLauncher::default()
            .start(&set_with_questions(0), &mut seeded(1))
            .is_err());
    }

    #[test]
    fn test_quiz_regenerate_needs_source() {
        let set = set_with_questions(6);
        let mut scorer = QuizLauncher::default().start(&set, &mut seeded(3)).unwrap();
        let generator = StubGenerator::default();
        assert!(matches!(
            QuizLauncher::default().regenerate(&mut scorer, &set, &generator),
            Err(EngineError::MissingSourceText)
        ));
    }

    #[test]
    fn test_quiz_regenerate_failure_keeps_progress() {
        let set = set_with_questions(6).with_source_text("Rome was founded in 753 BC.");
        let mut scorer = QuizLauncher::default().start(&set, &mut seeded(3)).unwrap();
        scorer.answer("A0").unwrap();
        let before: Vec<_> = scorer.questions().iter().map(|q| q.id).collect();

        let err = QuizLauncher::default().regenerate(&mut scorer, &set, &StubGenerator::failing());
        assert!(matches!(err, Err(EngineError::Generation(_))));
        let after: Vec<_> = scorer.questions().iter().map(|q| q.id).collect();
        assert_eq!(before, after);
        assert!(scorer.answer_for(before[0]).is_some());
    }

    #[test]
    fn test_quiz_regenerate_replaces() {
        let set = set_with_questions(6).with_source_text("notes");
        let mut scorer = QuizLauncher::default().start(&set, &mut seeded(3)).unwrap();
        let generator = StubGenerator::default();
        QuizLauncher::default()
            .regenerate(&mut scorer, &set, &generator)
            .unwrap();
        assert_eq!(scorer.questions()[0].prompt, "Generated 0");
        assert_eq!(generator.calls.borrow()[0], (5, Difficulty::Medium, 6));
    }

    #[test]
    fn test_quiz_regenerate_rejects_empty_output() {
        let set = set_with_questions(6).with_source_text("notes");
        let mut scorer = QuizLauncher::default().start(&set, &mut seeded(3)).unwrap();
        let before: Vec<_> = scorer.questions().iter().map(|q| q.id).collect();

        let err = QuizLauncher::new(0).regenerate(&mut scorer, &set, &StubGenerator::default());
        assert!(matches!(
            err,
            Err(EngineError::Generation(GenerationError::Malformed(_)))
        ));
        let after: Vec<_> = scorer.questions().iter().map(|q| q.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_test_length_validated() {
        assert!(TestLauncher::new(15).is_ok());
        assert!(TestLauncher::new(7).is_err());
    }

    #[test]
    fn test_test_generates_hard_questions() {
        let set = set_with_questions(3).with_source_text("notes");
        let generator = StubGenerator::default();
        let launcher = TestLauncher::new(5).unwrap();
        let scorer = launcher
            .start(&set, Some(&generator), &mut seeded(9))
            .unwrap();
        assert_eq!(scorer.questions().len(), 5);
        assert_eq!(scorer.difficulty(), Difficulty::Hard);
        assert_eq!(scorer.state(), ScorerState::InProgress);
        assert_eq!(generator.calls.borrow()[0].1, Difficulty::Hard);
    }

    #[test]
    fn test_test_falls_back_to_existing() {
        let set = set_with_questions(12).with_source_text("notes");
        let launcher = TestLauncher::new(10).unwrap();
        let scorer = launcher
            .start(&set, Some(&StubGenerator::failing()), &mut seeded(9))
            .unwrap();
        assert_eq!(scorer.questions().len(), 10);
        assert!(scorer
            .questions()
            .iter()
            .all(|q| set.questions.iter().any(|s| s.id == q.id)));

        let scorer = launcher.start(&set, None, &mut seeded(9)).unwrap();
        assert_eq!(scorer.questions().len(), 10);
    }
}
