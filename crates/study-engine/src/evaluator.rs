//! Answer evaluation.

use crate::models::Question;

/// Whether `submitted` answers `question` correctly.
///
/// Multiple-choice and true/false answers must match the expected option
/// exactly. Short answers are compared case-insensitively after trimming and
/// count if either string contains the other, so "paris, france" answers
/// "Paris" and "Paris" answers "Paris, France". A blank short answer is
/// always wrong. A blank expected answer is contained in everything, so any
/// non-blank answer to such a question counts.
pub fn is_correct(question: &Question, submitted: &str) -> bool {
    if question.kind.is_closed() {
        submitted == question.expected_answer
    } else {
        short_answer_matches(&question.expected_answer, submitted)
    }
}

/// Whether an answer counts as given.
pub fn is_blank(answer: &str) -> bool {
    answer.trim().is_empty()
}

fn short_answer_matches(expected: &str, submitted: &str) -> bool {
    if is_blank(submitted) {
        return false;
    }
    let expected = expected.trim().to_lowercase();
    let submitted = submitted.trim().to_lowercase();
    expected.contains(&submitted) || submitted.contains(&expected)
}
