//! In-memory item store.
//!
//! Each item lives in its own `RwLock` slot together with its review log.
//! The outer map lock is held only long enough to find or insert a slot, so
//! writes to different items never wait on each other. The owning learner is
//! kept beside each slot, so per-learner queries lock only that learner's
//! slots.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{due_order, ItemStore, UpdateFn};
use crate::error::{CadenceError, CadenceResult};
use crate::types::{LearningItem, ReviewLog};

struct Slot {
    item: LearningItem,
    reviews: Vec<ReviewLog>,
}

struct Entry {
    /// Immutable copy of `item.learner_id`.
    learner_id: String,
    slot: Arc<RwLock<Slot>>,
}

/// In-memory store, suitable for tests and ephemeral sessions.
#[derive(Default)]
pub struct InMemoryItemStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryItemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, item_id: &str) -> CadenceResult<Option<Arc<RwLock<Slot>>>> {
        let entries = self.entries.read()?;
        Ok(entries.get(item_id).map(|entry| Arc::clone(&entry.slot)))
    }

    /// Snapshot of a learner's slots, taken without holding item locks.
    fn learner_slots(&self, learner_id: &str) -> CadenceResult<Vec<Arc<RwLock<Slot>>>> {
        let entries = self.entries.read()?;
        Ok(entries
            .values()
            .filter(|entry| entry.learner_id == learner_id)
            .map(|entry| Arc::clone(&entry.slot))
            .collect())
    }

    fn learner_items(&self, learner_id: &str) -> CadenceResult<Vec<LearningItem>> {
        let mut items = Vec::new();
        for slot in self.learner_slots(learner_id)? {
            items.push(slot.read()?.item.clone());
        }
        Ok(items)
    }
}

impl ItemStore for InMemoryItemStore {
    fn insert_if_absent(&self, item: &LearningItem) -> CadenceResult<LearningItem> {
        let mut entries = self.entries.write()?;
        let entry = entries.entry(item.item_id.clone()).or_insert_with(|| Entry {
            learner_id: item.learner_id.clone(),
            slot: Arc::new(RwLock::new(Slot {
                item: item.clone(),
                reviews: Vec::new(),
            })),
        });
        let slot = Arc::clone(&entry.slot);
        drop(entries);

        let stored = slot.read()?.item.clone();
        Ok(stored)
    }

    fn get(&self, item_id: &str) -> CadenceResult<Option<LearningItem>> {
        match self.slot(item_id)? {
            Some(slot) => Ok(Some(slot.read()?.item.clone())),
            None => Ok(None),
        }
    }

    fn list_for_learner(&self, learner_id: &str) -> CadenceResult<Vec<LearningItem>> {
        let mut items = self.learner_items(learner_id)?;
        items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        Ok(items)
    }

    fn list_due(
        &self,
        learner_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> CadenceResult<Vec<LearningItem>> {
        let mut due: Vec<_> = self
            .learner_items(learner_id)?
            .into_iter()
            .filter(|item| item.is_due(now))
            .collect();
        due.sort_by(due_order);
        due.truncate(limit);
        Ok(due)
    }

    fn update_with(&self, item_id: &str, apply: &mut UpdateFn<'_>) -> CadenceResult<LearningItem> {
        let slot = self
            .slot(item_id)?
            .ok_or_else(|| CadenceError::not_found(item_id))?;

        let mut slot = slot.write()?;
        let (item, log) = apply(&slot.item)?;
        slot.item = item.clone();
        slot.reviews.push(log);
        Ok(item)
    }

    fn reviews_for_learner(&self, learner_id: &str) -> CadenceResult<Vec<ReviewLog>> {
        let mut reviews = Vec::new();
        for slot in self.learner_slots(learner_id)? {
            reviews.extend(slot.read()?.reviews.iter().cloned());
        }
        reviews.sort_by_key(|log| log.reviewed_at);
        Ok(reviews)
    }

    fn reviews_for_item(&self, item_id: &str) -> CadenceResult<Vec<ReviewLog>> {
        match self.slot(item_id)? {
            Some(slot) => Ok(slot.read()?.reviews.clone()),
            None => Ok(Vec::new()),
        }
    }

    fn count(&self) -> CadenceResult<usize> {
        Ok(self.entries.read()?.len())
    }
}
