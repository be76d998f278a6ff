//! Set statistics.

use crate::ledger::History;
use crate::models::{SessionResult, StudySet};
use chrono::{DateTime, Utc};

/// Snapshot of a set's progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetStats {
    /// Total cards.
    pub total_cards: usize,
    /// Cards in box 0.
    pub new_or_struggling: usize,
    /// Cards whose due time has passed.
    pub due_now: usize,
    /// Cards in the top box.
    pub mastered: usize,
    /// Card count per box.
    pub by_level: [usize; 6],
    /// Question bank size.
    pub total_questions: usize,
    /// Most recent quiz or test.
    pub last_result: Option<SessionResult>,
    /// Mean score percentage.
    pub average_percentage: Option<f64>,
}

impl SetStats {
    pub fn compute(set: &StudySet, now: DateTime<Utc>) -> Self {
        let mut stats = Self {
            total_cards: set.flashcards.len(),
            total_questions: set.questions.len(),
            ..Self::default()
        };
        for card in &set.flashcards {
            stats.by_level[usize::from(card.mastery.get())] += 1;
            if card.is_due(now) {
                stats.due_now += 1;
            }
        }
        stats.new_or_struggling = stats.by_level[0];
        stats.mastered = stats.by_level[5];

        let history = History::of(set);
        stats.last_result = history.last().cloned();
        stats.average_percentage = history.average_percentage();
        stats
    }

    /// Share of cards in the top box, 0.0 to 1.0.
    pub fn mastery_ratio(&self) -> f64 {
        if self.total_cards == 0 {
            0.0
        } else {
            self.mastered as f64 / self.total_cards as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Flashcard, MasteryLevel};
    use chrono::Duration;

    #[test]
    fn test_stats() {
        let now = Utc::now();
        let mut set = StudySet::new("Stats", now);
        for level in [0u8, 0, 2, 5] {
            let mut card = Flashcard::new("q", "a", now);
            card.mastery = MasteryLevel::new(level).unwrap();
            card.next_review_at = now + Duration::days(i64::from(level));
            set.flashcards.push(card);
        }

        let stats = SetStats::compute(&set, now);
        assert_eq!(stats.total_cards, 4);
        assert_eq!(stats.new_or_struggling, 2);
        assert_eq!(stats.due_now, 2);
        assert_eq!(stats.mastered, 1);
        assert_eq!(stats.by_level, [2, 0, 1, 0, 0, 1]);
        assert!((stats.mastery_ratio() - 0.25).abs() < f64::EPSILON);
        assert!(stats.last_result.is_none());
    }
}
