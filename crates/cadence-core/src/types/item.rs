//! Learning item state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state of a learning item.
///
/// `New -> Learning -> Review <-> Relearning`. There is no terminal state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CardState {
    /// Created but never reviewed.
    #[default]
    New,
    /// Reviewed at least once, not yet past the minimum-reps threshold.
    Learning,
    /// Established item on its regular interval.
    Review,
    /// Failed while established; returns to `Review` on the next pass.
    Relearning,
}

impl CardState {
    /// Whether a failed review from this state counts as a lapse.
    pub fn is_established(self) -> bool {
        matches!(self, CardState::Review | CardState::Relearning)
    }
}

/// One schedulable unit of review for one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningItem {
    /// Opaque unique identifier, stable across reviews.
    pub item_id: String,
    /// Owning learner. Items are never shared between learners.
    pub learner_id: String,
    /// Knowledge-graph concept this item exercises.
    pub node_id: String,
    /// Categorical tag (production, recognition, ...). Passed through untouched.
    pub item_type: String,
    /// Lifecycle state.
    pub state: CardState,
    /// Memory strength in days. Always > 0.
    pub stability: f32,
    /// Intrinsic hardness, clamped to [1.0, 10.0].
    pub difficulty: f32,
    /// Whole days since `last_review`, derived at update/query time.
    pub elapsed_days: u32,
    /// Interval chosen at the last update.
    pub scheduled_days: u32,
    /// Applied reviews.
    pub reps: u32,
    /// Failed reviews of an established item.
    pub lapses: u32,
    /// Most recent applied review.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_review: Option<DateTime<Utc>>,
    /// Eligible for review at or after this instant.
    pub due_date: DateTime<Utc>,
}

impl LearningItem {
    /// Whether the item is eligible for review at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date <= now
    }

    /// Whole days between the last review and `now` (0 if never reviewed).
    pub fn days_since_review(&self, now: DateTime<Utc>) -> u32 {
        self.last_review
            .map(|last| whole_days_between(last, now))
            .unwrap_or(0)
    }

    /// Copy of this item with `elapsed_days` derived for `now`.
    pub fn with_elapsed(mut self, now: DateTime<Utc>) -> Self {
        self.elapsed_days = self.days_since_review(now);
        self
    }
}

/// Whole days from `from` to `to`, saturating at zero.
fn whole_days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    let days = to.signed_duration_since(from).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// Request to create an item for a learner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewItem {
    /// Explicit identifier. A UUID is generated when absent.
    #[serde(default)]
    pub item_id: Option<String>,
    pub learner_id: String,
    pub node_id: String,
    pub item_type: String,
}

impl NewItem {
    /// Create a new item request with a generated id.
    pub fn new(
        learner_id: impl Into<String>,
        node_id: impl Into<String>,
        item_type: impl Into<String>,
    ) -> Self {
        Self {
            item_id: None,
            learner_id: learner_id.into(),
            node_id: node_id.into(),
            item_type: item_type.into(),
        }
    }

    /// Use an explicit item id.
    pub fn with_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    fn item_at(last_review: Option<DateTime<Utc>>, due: DateTime<Utc>) -> LearningItem {
        LearningItem {
            item_id: "card-1".to_string(),
            learner_id: "brett".to_string(),
            node_id: "node.ser".to_string(),
            item_type: "production".to_string(),
            state: CardState::Review,
            stability: 3.0,
            difficulty: 5.0,
            elapsed_days: 0,
            scheduled_days: 3,
            reps: 2,
            lapses: 0,
            last_review,
            due_date: due,
        }
    }

    #[test]
    fn test_card_state_round_trips_as_snake_case() {
        assert_eq!(CardState::Relearning.to_string(), "relearning");
        assert_eq!(CardState::from_str("review").unwrap(), CardState::Review);
        assert_eq!(serde_json::to_string(&CardState::New).unwrap(), "\"new\"");
    }

    #[test]
    fn test_established_states() {
        assert!(!CardState::New.is_established());
        assert!(!CardState::Learning.is_established());
        assert!(CardState::Review.is_established());
        assert!(CardState::Relearning.is_established());
    }

    #[test]
    fn test_days_since_review_floors_partial_days() {
        let now = Utc::now();
        let item = item_at(Some(now - Duration::hours(47)), now);
        assert_eq!(item.days_since_review(now), 1);

        let never = item_at(None, now);
        assert_eq!(never.days_since_review(now), 0);
    }

    #[test]
    fn test_days_since_review_saturates_for_future_reviews() {
        let now = Utc::now();
        let item = item_at(Some(now + Duration::days(2)), now);
        assert_eq!(item.days_since_review(now), 0);
    }

    #[test]
    fn test_is_due_boundary() {
        let now = Utc::now();
        assert!(item_at(None, now).is_due(now));
        assert!(!item_at(None, now + Duration::seconds(1)).is_due(now));
    }
}
