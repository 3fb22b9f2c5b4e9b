//! Item storage trait and implementations.
//!
//! The scheduler talks to storage only through [`ItemStore`]. Backends are
//! chosen once at construction time.

mod memory;
mod sqlite;

pub use memory::InMemoryItemStore;
pub use sqlite::SqliteItemStore;

use chrono::{DateTime, Utc};

use crate::error::CadenceResult;
use crate::types::{LearningItem, ReviewLog};

/// Closure applied by [`ItemStore::update_with`]: current item in, replacement
/// item and its review-log entry out.
pub type UpdateFn<'a> = dyn FnMut(&LearningItem) -> CadenceResult<(LearningItem, ReviewLog)> + 'a;

/// Trait for learning item storage operations.
pub trait ItemStore: Send + Sync {
    /// Insert `item` unless its id exists. Returns the stored item either way.
    fn insert_if_absent(&self, item: &LearningItem) -> CadenceResult<LearningItem>;

    /// Get an item by ID.
    fn get(&self, item_id: &str) -> CadenceResult<Option<LearningItem>>;

    /// All items owned by a learner, ordered by item id.
    fn list_for_learner(&self, learner_id: &str) -> CadenceResult<Vec<LearningItem>>;

    /// Items with `due_date <= now`, ascending by due date then item id.
    fn list_due(
        &self,
        learner_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> CadenceResult<Vec<LearningItem>>;

    /// Atomically replace one item with the result of `apply` and append the
    /// returned log entry.
    ///
    /// Concurrent calls for the same id are serialized. If `apply` fails,
    /// nothing is written and its error is returned. Fails with `NotFound`
    /// when the id is unknown.
    fn update_with(&self, item_id: &str, apply: &mut UpdateFn<'_>) -> CadenceResult<LearningItem>;

    /// Review log of a learner, oldest first.
    fn reviews_for_learner(&self, learner_id: &str) -> CadenceResult<Vec<ReviewLog>>;

    /// Review log of one item, oldest first.
    fn reviews_for_item(&self, item_id: &str) -> CadenceResult<Vec<ReviewLog>>;

    /// Number of stored items.
    fn count(&self) -> CadenceResult<usize>;
}

/// Sort key shared by every backend's due queue.
pub(crate) fn due_order(a: &LearningItem, b: &LearningItem) -> std::cmp::Ordering {
    a.due_date
        .cmp(&b.due_date)
        .then_with(|| a.item_id.cmp(&b.item_id))
}
