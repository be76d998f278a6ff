//! Result history.

use crate::error::EngineResult;
use crate::models::{SessionResult, StudySet};
use tracing::info;

/// Sink for finalized session results. Results are only ever appended.
pub trait ResultLedger {
    /// Append a result.
    fn record(&mut self, result: SessionResult) -> EngineResult<()>;
}

impl ResultLedger for StudySet {
    fn record(&mut self, result: SessionResult) -> EngineResult<()> {
        info!(
            set = %self.id,
            mode = %result.mode,
            score = result.score,
            total = result.total_questions,
            "recorded session result"
        );
        self.results.push(result);
        Ok(())
    }
}

impl ResultLedger for Vec<SessionResult> {
    fn record(&mut self, result: SessionResult) -> EngineResult<()> {
        self.push(result);
        Ok(())
    }
}

/// Read-only queries over a result history.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    results: &'a [SessionResult],
}

impl<'a> History<'a> {
    pub fn new(results: &'a [SessionResult]) -> Self {
        Self { results }
    }

    pub fn of(set: &'a StudySet) -> Self {
        Self::new(&set.results)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Most recent result.
    pub fn last(&self) -> Option<&'a SessionResult> {
        self.results.last()
    }

    /// Highest percentage, earliest wins ties.
    pub fn best(&self) -> Option<&'a SessionResult> {
        self.results
            .iter()
            .rev()
            .max_by_key(|r| r.percentage())
    }

    /// Mean percentage across all results.
    pub fn average_percentage(&self) -> Option<f64> {
        if self.results.is_empty() {
            return None;
        }
        let total: u32 = self.results.iter().map(SessionResult::percentage).sum();
        Some(f64::from(total) / self.results.len() as f64)
    }

    /// Results in chronological order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &'a SessionResult> + 'a {
        self.results.iter()
    }
}
