//! Learner statistics.

use serde::{Deserialize, Serialize};

/// Read-only aggregate over all of a learner's items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerStats {
    pub learner_id: String,
    pub total_items: usize,
    /// Items with `due_date <= now`.
    pub due_count: usize,
    pub new_count: usize,
    pub learning_count: usize,
    pub review_count: usize,
    pub relearning_count: usize,
    /// Items whose stability exceeds the mastered threshold.
    pub mastered_count: usize,
    /// Mean difficulty across all items, 0 when the learner has none.
    pub average_difficulty: f32,
    /// Items last reviewed on the current local calendar day.
    pub reviews_today: usize,
    /// Consecutive local days with a review, ending today or yesterday.
    pub streak_days: u32,
}
