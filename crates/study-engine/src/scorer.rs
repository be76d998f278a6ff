//! Quiz and test scoring.
//!
//! A [`SessionScorer`] walks a fixed list of questions and turns the
//! learner's answers into a [`SessionResult`].
//!
//! - **Quiz**: each answer is judged and revealed at once. Stepping past the
//!   last question finalizes the session.
//! - **Test**: answers stay hidden until every question has a non-blank
//!   answer and the test is submitted. Results can then be reviewed and
//!   overridden before an explicit finish.
//!
//! Once a verdict is visible the learner may mark a wrong answer as correct.
//! Overrides are one-way and end at finalization.

use crate::error::{EngineError, EngineResult};
use crate::evaluator::{is_blank, is_correct};
use crate::ledger::ResultLedger;
use crate::models::{Difficulty, Question, QuestionId, SessionMode, SessionResult};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Scorer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerState {
    /// Answers are being collected.
    InProgress,
    /// Test submitted, results visible, overrides allowed.
    AwaitingOverrideReview,
    /// Result emitted. Nothing changes after this.
    Finalized,
}

/// Visible judgement of one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
    /// Judged wrong, then marked correct by the learner.
    Overridden,
}

impl Verdict {
    /// Whether the answer counts toward the score.
    pub fn counts(&self) -> bool {
        !matches!(self, Self::Incorrect)
    }
}

/// Scores one quiz or test attempt.
#[derive(Debug, Clone)]
pub struct SessionScorer {
    mode: SessionMode,
    difficulty: Difficulty,
    questions: Vec<Question>,
    answers: HashMap<QuestionId, String>,
    /// Quiz questions whose verdict has been shown.
    revealed: HashSet<QuestionId>,
    overrides: HashSet<QuestionId>,
    cursor: usize,
    state: ScorerState,
    result: Option<SessionResult>,
}

impl SessionScorer {
    /// Create a scorer. The difficulty label defaults from the mode.
    pub fn new(mode: SessionMode, questions: Vec<Question>) -> EngineResult<Self> {
        if questions.is_empty() {
            return Err(EngineError::EmptySession);
        }
        Ok(Self {
            mode,
            difficulty: mode.difficulty(),
            questions,
            answers: HashMap::new(),
            revealed: HashSet::new(),
            overrides: HashSet::new(),
            cursor: 0,
            state: ScorerState::InProgress,
            result: None,
        })
    }

    /// Create a quiz scorer.
    pub fn quiz(questions: Vec<Question>) -> EngineResult<Self> {
        Self::new(SessionMode::Quiz, questions)
    }

    /// Create a test scorer.
    pub fn test(questions: Vec<Question>) -> EngineResult<Self> {
        Self::new(SessionMode::Test, questions)
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn state(&self) -> ScorerState {
        self.state
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Index of the question in focus.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Question in focus, if any remain.
    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.cursor)
    }

    /// The emitted result, once finalized.
    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    /// Answer recorded for a question.
    pub fn answer_for(&self, id: QuestionId) -> Option<&str> {
        self.answers.get(&id).map(String::as_str)
    }

    pub fn is_overridden(&self, id: QuestionId) -> bool {
        self.overrides.contains(&id)
    }

    /// Questions without a non-blank answer.
    pub fn unanswered(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| self.answer_for(q.id).map_or(true, is_blank))
            .count()
    }

    /// Answer the current quiz question and get its verdict.
    pub fn answer(&mut self, answer: impl Into<String>) -> EngineResult<Verdict> {
        self.require_mode(SessionMode::Quiz, "answer")?;
        self.require_state(ScorerState::InProgress, "answer")?;
        let question = self
            .current()
            .ok_or_else(|| EngineError::InvalidState("no question to answer".to_string()))?;
        let id = question.id;
        if self.revealed.contains(&id) {
            return Err(EngineError::InvalidState(
                "question already answered".to_string(),
            ));
        }

        self.answers.insert(id, answer.into());
        self.revealed.insert(id);
        let verdict = self.auto_verdict(id);
        debug!(question = %id, ?verdict, "quiz answer");
        Ok(verdict)
    }

    /// Record or change a test answer. Moves the cursor past that question.
    pub fn set_answer(&mut self, id: QuestionId, answer: impl Into<String>) -> EngineResult<()> {
        self.require_mode(SessionMode::Test, "set_answer")?;
        self.require_state(ScorerState::InProgress, "set_answer")?;
        let index = self
            .questions
            .iter()
            .position(|q| q.id == id)
            .ok_or(EngineError::QuestionNotFound(id))?;

        self.answers.insert(id, answer.into());
        self.cursor = self.cursor.max(index + 1).min(self.questions.len());
        Ok(())
    }

    /// Submit a test for review.
    ///
    /// Rejected with the number of blank answers if any remain; the scorer
    /// does not change in that case.
    pub fn submit(&mut self) -> EngineResult<()> {
        self.require_mode(SessionMode::Test, "submit")?;
        self.require_state(ScorerState::InProgress, "submit")?;
        let remaining = self.unanswered();
        if remaining > 0 {
            debug!(remaining, "test submission rejected");
            return Err(EngineError::Unanswered { remaining });
        }
        self.state = ScorerState::AwaitingOverrideReview;
        debug!(score = self.score(), "test submitted");
        Ok(())
    }

    /// Verdict for a question, if it has been revealed.
    pub fn verdict(&self, id: QuestionId) -> Option<Verdict> {
        if !self.is_revealed(id) {
            return None;
        }
        if self.overrides.contains(&id) {
            Some(Verdict::Overridden)
        } else {
            Some(self.auto_verdict(id))
        }
    }

    /// Mark a revealed wrong answer as correct.
    ///
    /// Returns whether the verdict changed. Calls before the verdict is
    /// visible, on correct answers, on already overridden answers, or after
    /// finalization have no effect.
    pub fn mark_correct(&mut self, id: QuestionId) -> bool {
        if self.state == ScorerState::Finalized {
            return false;
        }
        if self.verdict(id) != Some(Verdict::Incorrect) {
            return false;
        }
        self.overrides.insert(id);
        debug!(question = %id, "answer marked correct");
        true
    }

    /// Current score. Always recomputed, so overrides show immediately.
    pub fn score(&self) -> u32 {
        self.questions
            .iter()
            .filter(|q| self.overrides.contains(&q.id) || self.auto_correct(q))
            .count() as u32
    }

    /// Step past the current, already answered, quiz question.
    ///
    /// Stepping past the last question finalizes the quiz and returns its
    /// result.
    pub fn next<L>(
        &mut self,
        now: DateTime<Utc>,
        ledger: &mut L,
    ) -> EngineResult<Option<SessionResult>>
    where
        L: ResultLedger + ?Sized,
    {
        self.require_mode(SessionMode::Quiz, "next")?;
        self.require_state(ScorerState::InProgress, "next")?;
        let id = self
            .current()
            .map(|q| q.id)
            .ok_or_else(|| EngineError::InvalidState("no question to leave".to_string()))?;
        if !self.revealed.contains(&id) {
            return Err(EngineError::InvalidState(
                "answer the current question first".to_string(),
            ));
        }

        if self.cursor + 1 == self.questions.len() {
            let result = self.emit(now, ledger)?;
            self.cursor = self.questions.len();
            return Ok(Some(result));
        }
        self.cursor += 1;
        Ok(None)
    }

    /// Finish a reviewed test, or a quiz whose questions are all answered.
    pub fn finalize<L>(&mut self, now: DateTime<Utc>, ledger: &mut L) -> EngineResult<SessionResult>
    where
        L: ResultLedger + ?Sized,
    {
        match (self.mode, self.state) {
            (_, ScorerState::Finalized) => Err(EngineError::InvalidState(
                "session already finalized".to_string(),
            )),
            (SessionMode::Test, ScorerState::InProgress) => Err(EngineError::InvalidState(
                "submit the test before finishing".to_string(),
            )),
            (SessionMode::Quiz, _) if self.revealed.len() < self.questions.len() => Err(
                EngineError::InvalidState("quiz has unanswered questions".to_string()),
            ),
            _ => {
                let result = self.emit(now, ledger)?;
                self.cursor = self.questions.len();
                Ok(result)
            }
        }
    }

    /// Replace the questions and start over. Only allowed before submission.
    pub fn regenerate(&mut self, questions: Vec<Question>) -> EngineResult<()> {
        self.require_state(ScorerState::InProgress, "regenerate")?;
        if questions.is_empty() {
            return Err(EngineError::EmptySession);
        }
        debug!(count = questions.len(), "questions replaced");
        self.questions = questions;
        self.reset_progress();
        Ok(())
    }

    /// Clear answers, overrides and cursor, keeping the questions.
    pub fn reset(&mut self) -> EngineResult<()> {
        self.require_state(ScorerState::InProgress, "reset")?;
        self.reset_progress();
        Ok(())
    }

    fn reset_progress(&mut self) {
        self.answers.clear();
        self.revealed.clear();
        self.overrides.clear();
        self.cursor = 0;
    }

    fn emit<L>(&mut self, now: DateTime<Utc>, ledger: &mut L) -> EngineResult<SessionResult>
    where
        L: ResultLedger + ?Sized,
    {
        let result = SessionResult {
            date: now,
            score: self.score(),
            total_questions: self.questions.len() as u32,
            difficulty: self.difficulty,
            mode: self.mode,
        };
        // The ledger must accept the result before the session closes.
        ledger.record(result.clone())?;
        self.state = ScorerState::Finalized;
        self.result = Some(result.clone());
        info!(
            mode = %self.mode,
            score = result.score,
            total = result.total_questions,
            "session finalized"
        );
        Ok(result)
    }

    fn is_revealed(&self, id: QuestionId) -> bool {
        match self.mode {
            SessionMode::Quiz => self.revealed.contains(&id),
            SessionMode::Test => {
                self.state != ScorerState::InProgress && self.questions.iter().any(|q| q.id == id)
            }
        }
    }

    fn auto_correct(&self, question: &Question) -> bool {
        self.answer_for(question.id)
            .is_some_and(|answer| is_correct(question, answer))
    }

    fn auto_verdict(&self, id: QuestionId) -> Verdict {
        let correct = self
            .questions
            .iter()
            .find(|q| q.id == id)
            .is_some_and(|q| self.auto_correct(q));
        if correct {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        }
    }

    fn require_mode(&self, mode: SessionMode, op: &str) -> EngineResult<()> {
        if self.mode == mode {
            Ok(())
        } else {
            Err(EngineError::InvalidState(format!(
                "{op} is not available in {} mode",
                self.mode
            )))
        }
    }

    fn require_state(&self, state: ScorerState, op: &str) -> EngineResult<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(EngineError::InvalidState(format!(
                "{op} is not allowed while {:?}",
                self.state
            )))
        }
    }
}
