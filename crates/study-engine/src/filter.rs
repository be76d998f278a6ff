//! Card selection per study mode.

use crate::error::EngineError;
use crate::models::Flashcard;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flashcard study mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    /// Every card, in set order.
    Standard,
    /// Due cards plus cards still in box 0.
    #[default]
    Learn,
    /// Only cards in box 0.
    Review,
}

impl StudyMode {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Learn => "Learn",
            Self::Review => "Review",
        }
    }

    /// Whether the mode accepts pass/fail grading.
    pub fn is_graded(&self) -> bool {
        matches!(self, Self::Learn)
    }

    /// Whether a card belongs in a session of this mode.
    pub fn includes(&self, card: &Flashcard, now: DateTime<Utc>) -> bool {
        match self {
            Self::Standard => true,
            // Box 0 cards are included even if their due time is a hair in the future.
            Self::Learn => card.is_due(now) || card.mastery.is_new(),
            Self::Review => card.mastery.is_new(),
        }
    }
}

impl std::fmt::Display for StudyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for StudyMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "learn" => Ok(Self::Learn),
            "review" => Ok(Self::Review),
            _ => Err(EngineError::InvalidInput(format!("unknown study mode '{s}'"))),
        }
    }
}

/// Select the cards for a session, keeping input order.
///
/// An empty result is normal; callers decide how to phrase it.
pub fn select_cards(cards: &[Flashcard], mode: StudyMode, now: DateTime<Utc>) -> Vec<Flashcard> {
    cards
        .iter()
        .filter(|card| mode.includes(card, now))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MasteryLevel;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn card(level: u8, due_in_hours: i64) -> Flashcard {
        let mut card = Flashcard::new(format!("Q{level}"), "A", now());
        card.mastery = MasteryLevel::new(level).unwrap();
        card.next_review_at = now() + Duration::hours(due_in_hours);
        card
    }

    fn ids(cards: &[Flashcard]) -> Vec<uuid::Uuid> {
        cards.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_standard_passes_everything() {
        let cards = vec![card(3, 48), card(0, 0), card(5, -1)];
        assert_eq!(ids(&select_cards(&cards, StudyMode::Standard, now())), ids(&cards));
    }

    #[test]
    fn test_learn_unions_due_and_new() {
        let due = card(2, -1);
        let fresh_future = card(0, 1);
        let not_due = card(3, 24);
        let due_now = card(4, 0);
        let cards = vec![due.clone(), fresh_future.clone(), not_due, due_now.clone()];

        let selected = select_cards(&cards, StudyMode::Learn, now());
        assert_eq!(ids(&selected), vec![due.id, fresh_future.id, due_now.id]);
    }

    #[test]
    fn test_review_ignores_due_time() {
        let struggling = card(0, 72);
        let cards = vec![card(1, -5), struggling.clone(), card(5, -100)];
        let selected = select_cards(&cards, StudyMode::Review, now());
        assert_eq!(ids(&selected), vec![struggling.id]);
    }

    #[test]
    fn test_empty_is_normal() {
        assert!(select_cards(&[], StudyMode::Learn, now()).is_empty());
        assert!(select_cards(&[card(2, 10)], StudyMode::Review, now()).is_empty());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("LEARN".parse::<StudyMode>().unwrap(), StudyMode::Learn);
        assert!("cram".parse::<StudyMode>().is_err());
    }

    proptest! {
        #[test]
        fn prop_learn_membership(specs in prop::collection::vec((0u8..=5, -100i64..100), 0..30)) {
            let cards: Vec<_> = specs.iter().map(|&(l, h)| card(l, h)).collect();
            let selected = select_cards(&cards, StudyMode::Learn, now());
            let expected: Vec<_> = cards
                .iter()
                .filter(|c| c.mastery.get() == 0 || c.next_review_at <= now())
                .map(|c| c.id)
                .collect();
            prop_assert_eq!(ids(&selected), expected);
        }

        #[test]
        fn prop_review_membership(specs in prop::collection::vec((0u8..=5, -100i64..100), 0..30)) {
            let cards: Vec<_> = specs.iter().map(|&(l, h)| card(l, h)).collect();
            let selected = select_cards(&cards, StudyMode::Review, now());
            prop_assert!(selected.iter().all(|c| c.mastery.get() == 0));
            prop_assert_eq!(selected.len(), cards.iter().filter(|c| c.mastery.get() == 0).count());
        }

        #[test]
        fn prop_selection_is_pure(specs in prop::collection::vec((0u8..=5, -100i64..100), 0..30)) {
            let cards: Vec<_> = specs.iter().map(|&(l, h)| card(l, h)).collect();
            let before = cards.clone();
            let a = select_cards(&cards, StudyMode::Learn, now());
            let b = select_cards(&cards, StudyMode::Learn, now());
            prop_assert_eq!(a, b);
            prop_assert_eq!(cards, before);
        }
    }
}
