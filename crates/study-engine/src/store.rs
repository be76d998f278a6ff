//! Study set repository.
//!
//! The engine never talks to storage directly. Callers hand it a
//! [`StudySetStore`]; the helpers here perform the two read-modify-write
//! cycles the engine needs:
//!
//! - [`commit_review`] saves one graded flashcard immediately
//! - [`record_result`] appends a finalized session result
//!
//! Writes are last-write-wins. Nothing here guards against two processes
//! editing the same set.

use crate::error::{EngineError, EngineResult};
use crate::ledger::ResultLedger;
use crate::models::{CardId, Flashcard, SessionResult, SetId, StudySet};
use crate::scheduler::review_card;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::info;

/// Keyed collection of study sets.
pub trait StudySetStore {
    /// All sets, newest first.
    fn list(&self) -> EngineResult<Vec<StudySet>>;

    /// A single set.
    fn get(&self, id: SetId) -> EngineResult<Option<StudySet>>;

    /// Insert or replace a set with everything it owns.
    fn put(&mut self, set: &StudySet) -> EngineResult<()>;

    /// Delete a set with everything it owns. Returns whether it existed.
    fn delete(&mut self, id: SetId) -> EngineResult<bool>;
}

/// In-process store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    sets: HashMap<SetId, StudySet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StudySetStore for MemoryStore {
    fn list(&self) -> EngineResult<Vec<StudySet>> {
        let mut sets: Vec<_> = self.sets.values().cloned().collect();
        sets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sets)
    }

    fn get(&self, id: SetId) -> EngineResult<Option<StudySet>> {
        Ok(self.sets.get(&id).cloned())
    }

    fn put(&mut self, set: &StudySet) -> EngineResult<()> {
        self.sets.insert(set.id, set.clone());
        Ok(())
    }

    fn delete(&mut self, id: SetId) -> EngineResult<bool> {
        Ok(self.sets.remove(&id).is_some())
    }
}

/// Grade one flashcard and persist it right away.
pub fn commit_review<S>(
    store: &mut S,
    set_id: SetId,
    card_id: CardId,
    was_correct: bool,
    now: DateTime<Utc>,
) -> EngineResult<Flashcard>
where
    S: StudySetStore + ?Sized,
{
    let mut set = store.get(set_id)?.ok_or(EngineError::SetNotFound(set_id))?;
    let card = set.card(card_id).ok_or(EngineError::CardNotFound(card_id))?;
    let updated = review_card(card, was_correct, now);
    set.replace_card(updated.clone())?;
    store.put(&set)?;
    Ok(updated)
}

/// Append a result to a stored set's history.
pub fn record_result<S>(store: &mut S, set_id: SetId, result: SessionResult) -> EngineResult<()>
where
    S: StudySetStore + ?Sized,
{
    let mut set = store.get(set_id)?.ok_or(EngineError::SetNotFound(set_id))?;
    set.record(result)?;
    store.put(&set)?;
    info!(set = %set_id, "result saved");
    Ok(())
}

/// Ledger that writes straight through to a store.
pub struct StoreLedger<'a, S: StudySetStore + ?Sized> {
    store: &'a mut S,
    set_id: SetId,
}

impl<'a, S: StudySetStore + ?Sized> StoreLedger<'a, S> {
    pub fn new(store: &'a mut S, set_id: SetId) -> Self {
        Self { store, set_id }
    }
}

impl<S: StudySetStore + ?Sized> ResultLedger for StoreLedger<'_, S> {
    fn record(&mut self, result: SessionResult) -> EngineResult<()> {
        record_result(&mut *self.store, self.set_id, result)
    }
}
