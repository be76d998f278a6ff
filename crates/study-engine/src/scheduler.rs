//! Mastery scheduling.
//!
//! Six Leitner-style boxes. A correct answer moves a card up one box, a miss
//! sends it back to box 0. The box a card lands in decides how long until it
//! is due again:
//!
//! | box | interval |
//! |-----|----------|
//! | 0   | now      |
//! | 1   | 1 day    |
//! | 2   | 3 days   |
//! | 3   | 7 days   |
//! | 4   | 14 days  |
//! | 5   | 30 days  |

use crate::models::{Flashcard, MasteryLevel};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Days until the next review, indexed by the box a card lands in.
pub const INTERVAL_DAYS: [i64; 6] = [0, 1, 3, 7, 14, 30];

/// Interval for a box.
pub fn interval_days(level: MasteryLevel) -> i64 {
    INTERVAL_DAYS[usize::from(level.get())]
}

/// Compute the next state of a card after it was graded.
///
/// A miss always resets to box 0, however far the card had progressed.
pub fn review_card(card: &Flashcard, was_correct: bool, now: DateTime<Utc>) -> Flashcard {
    let mastery = if was_correct {
        card.mastery.promoted()
    } else {
        MasteryLevel::NEW
    };
    let next_review_at = now + Duration::days(interval_days(mastery));

    debug!(
        card = %card.id,
        from = %card.mastery,
        to = %mastery,
        was_correct,
        "scheduled review"
    );

    Flashcard {
        mastery,
        next_review_at,
        last_reviewed_at: Some(now),
        ..card.clone()
    }
}

/// Format an interval in days to a human-readable string.
pub fn format_interval(days: i64) -> String {
    match days {
        d if d <= 0 => "now".to_string(),
        d if d < 7 => format!("{d}d"),
        d if d < 30 => format!("{}w", d / 7),
        d if d < 365 => format!("{}mo", d / 30),
        d => format!("{}y", d / 365),
    }
}
