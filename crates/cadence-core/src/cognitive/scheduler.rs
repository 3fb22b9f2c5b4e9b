//! Review scheduler.
//!
//! Owns the item store and the memory model, validates every request before
//! touching state, and is the only code path that mutates items.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{MemoryModel, MemoryState};
use super::stats::{self, StatsInput};
use crate::config::{SchedulerConfig, StorageBackend};
use crate::error::{CadenceError, CadenceResult};
use crate::store::{InMemoryItemStore, ItemStore, SqliteItemStore};
use crate::types::{
    CardState, Grade, LearnerStats, LearningItem, NewItem, ReviewLog, ReviewOutcome,
};

/// Smallest accepted due-queue limit.
pub const MIN_DUE_LIMIT: usize = 1;
/// Largest accepted due-queue limit.
pub const MAX_DUE_LIMIT: usize = 100;

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:@-]{1,128}$").expect("valid id pattern"));

/// Spaced-repetition scheduler over an injected [`ItemStore`].
pub struct Scheduler {
    store: Arc<dyn ItemStore>,
    model: MemoryModel,
    config: SchedulerConfig,
    timezone: FixedOffset,
}

impl Scheduler {
    /// Create a scheduler over an existing store.
    pub fn new(store: Arc<dyn ItemStore>, config: SchedulerConfig) -> CadenceResult<Self> {
        config.validate()?;
        let timezone = config.timezone()?;
        let model = MemoryModel::new(config.model.clone(), config.min_reps_for_review);

        Ok(Self {
            store,
            model,
            config,
            timezone,
        })
    }

    /// Create a scheduler with the backend named in `config.storage`.
    pub fn from_config(config: SchedulerConfig) -> CadenceResult<Self> {
        let store: Arc<dyn ItemStore> = match config.storage.backend {
            StorageBackend::Sqlite => Arc::new(SqliteItemStore::new(&config.storage.db_path)?),
            StorageBackend::Memory => Arc::new(InMemoryItemStore::new()),
        };
        Self::new(store, config)
    }

    /// Create a scheduler with default settings over an in-memory store.
    pub fn in_memory() -> CadenceResult<Self> {
        let config = SchedulerConfig::builder().in_memory().build()?;
        Self::new(Arc::new(InMemoryItemStore::new()), config)
    }

    /// Create a `New` item for a learner, due immediately.
    ///
    /// Scheduling an id that already exists for the same learner returns the
    /// stored item unchanged.
    pub fn schedule_item(&self, new_item: NewItem, now: DateTime<Utc>) -> CadenceResult<LearningItem> {
        validate_id("learner_id", &new_item.learner_id)?;
        validate_non_empty("node_id", &new_item.node_id)?;
        validate_non_empty("item_type", &new_item.item_type)?;
        let item_id = match new_item.item_id {
            Some(id) => {
                validate_id("item_id", &id)?;
                id
            }
            None => Uuid::new_v4().to_string(),
        };

        let item = LearningItem {
            item_id,
            learner_id: new_item.learner_id,
            node_id: new_item.node_id,
            item_type: new_item.item_type,
            state: CardState::New,
            stability: self.config.initial_stability,
            difficulty: self.config.initial_difficulty,
            elapsed_days: 0,
            scheduled_days: 0,
            reps: 0,
            lapses: 0,
            last_review: None,
            due_date: now,
        };

        let stored = self.store.insert_if_absent(&item)?;
        if stored.learner_id != item.learner_id {
            warn!(item_id = %item.item_id, "item id already owned by another learner");
            return Err(CadenceError::invalid_field(
                "item_id",
                format!("item '{}' belongs to another learner", item.item_id),
            ));
        }

        debug!(item_id = %stored.item_id, learner_id = %stored.learner_id, "scheduled item");
        Ok(stored)
    }

    /// Items due at `now` for a learner, earliest first, ties by item id.
    ///
    /// Returned items carry `elapsed_days` derived for `now`; nothing is written.
    pub fn get_due_items(
        &self,
        learner_id: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> CadenceResult<Vec<LearningItem>> {
        validate_id("learner_id", learner_id)?;
        if !(MIN_DUE_LIMIT..=MAX_DUE_LIMIT).contains(&limit) {
            warn!(limit, "rejected due-queue limit");
            return Err(CadenceError::invalid_field(
                "limit",
                format!(
                    "limit must be between {} and {}, got {}",
                    MIN_DUE_LIMIT, MAX_DUE_LIMIT, limit
                ),
            ));
        }

        let items: Vec<_> = self
            .store
            .list_due(learner_id, now, limit)?
            .into_iter()
            .map(|item| item.with_elapsed(now))
            .collect();

        debug!(learner_id, count = items.len(), "due items");
        Ok(items)
    }

    /// Apply a graded review and return the updated item.
    ///
    /// The read-modify-write runs atomically per item inside the store.
    pub fn apply_review(&self, outcome: ReviewOutcome) -> CadenceResult<LearningItem> {
        validate_id("item_id", &outcome.item_id)?;
        let grade = Grade::from_quality(outcome.quality).map_err(|e| {
            warn!(item_id = %outcome.item_id, quality = outcome.quality, "rejected review quality");
            e
        })?;
        // In range after grading
        let quality = u8::try_from(outcome.quality)
            .map_err(|_| CadenceError::invalid_field("quality", "quality out of range"))?;
        let reviewed_at = outcome.reviewed_at.unwrap_or_else(Utc::now);
        let model = &self.model;

        let updated = self.store.update_with(&outcome.item_id, &mut |current| {
            if let Some(last) = current.last_review {
                if reviewed_at < last {
                    return Err(CadenceError::invalid_field(
                        "reviewed_at",
                        format!(
                            "reviewed_at {} is earlier than last review {}",
                            reviewed_at.to_rfc3339(),
                            last.to_rfc3339()
                        ),
                    ));
                }
            }

            let next = model.next_state(
                &MemoryState {
                    stability: current.stability,
                    difficulty: current.difficulty,
                    state: current.state,
                    reps: current.reps,
                },
                grade,
            )?;

            let elapsed_days = current.days_since_review(reviewed_at);
            // Intervals are capped, so only a reviewed_at at the calendar's end overflows
            let due_date = Duration::try_days(i64::from(next.scheduled_days))
                .and_then(|interval| reviewed_at.checked_add_signed(interval))
                .ok_or_else(|| {
                    CadenceError::invalid_field(
                        "reviewed_at",
                        format!(
                            "reviewed_at {} plus {} days is outside the supported calendar",
                            reviewed_at.to_rfc3339(),
                            next.scheduled_days
                        ),
                    )
                })?;
            let item = LearningItem {
                state: next.state,
                stability: next.stability,
                difficulty: next.difficulty,
                elapsed_days,
                scheduled_days: next.scheduled_days,
                reps: current.reps.saturating_add(1),
                lapses: current.lapses.saturating_add(u32::from(next.lapsed)),
                last_review: Some(reviewed_at),
                due_date,
                ..current.clone()
            };
            if item.lapses > item.reps {
                return Err(CadenceError::invariant(format!(
                    "item '{}' has more lapses ({}) than reps ({})",
                    item.item_id, item.lapses, item.reps
                )));
            }

            let log = ReviewLog {
                item_id: item.item_id.clone(),
                learner_id: item.learner_id.clone(),
                quality,
                state_before: current.state,
                state_after: item.state,
                elapsed_days,
                scheduled_days: item.scheduled_days,
                stability: item.stability,
                difficulty: item.difficulty,
                reviewed_at,
            };
            Ok((item, log))
        })?;

        info!(
            item_id = %updated.item_id,
            quality,
            state = %updated.state,
            stability = updated.stability,
            scheduled_days = updated.scheduled_days,
            "applied review"
        );
        Ok(updated)
    }

    /// Aggregate statistics over every item a learner owns.
    pub fn get_stats(&self, learner_id: &str, now: DateTime<Utc>) -> CadenceResult<LearnerStats> {
        validate_id("learner_id", learner_id)?;

        let items = self.store.list_for_learner(learner_id)?;
        let review_times: Vec<_> = self
            .store
            .reviews_for_learner(learner_id)?
            .into_iter()
            .map(|log| log.reviewed_at)
            .collect();

        let stats = stats::compute(&StatsInput {
            learner_id,
            items: &items,
            review_times: &review_times,
            now,
            timezone: self.timezone,
            mastered_stability_days: self.config.mastered_stability_days,
        });

        debug!(learner_id, total = stats.total_items, due = stats.due_count, "learner stats");
        Ok(stats)
    }

    /// Fetch one item.
    pub fn get_item(&self, item_id: &str) -> CadenceResult<LearningItem> {
        validate_id("item_id", item_id)?;
        self.store
            .get(item_id)?
            .ok_or_else(|| CadenceError::not_found(item_id))
    }

    /// Current probability of recall, using exact fractional elapsed days.
    pub fn retrievability(&self, item_id: &str, now: DateTime<Utc>) -> CadenceResult<f32> {
        let item = self.get_item(item_id)?;
        let elapsed_days = match item.last_review {
            Some(last) => now.signed_duration_since(last).num_seconds() as f32 / 86_400.0,
            None => 0.0,
        };
        Ok(self.model.retrievability(item.stability, elapsed_days))
    }

    /// Review log of one item, oldest first.
    pub fn review_history(&self, item_id: &str) -> CadenceResult<Vec<ReviewLog>> {
        let item = self.get_item(item_id)?;
        self.store.reviews_for_item(&item.item_id)
    }
}

fn validate_id(field: &'static str, value: &str) -> CadenceResult<()> {
    if ID_PATTERN.is_match(value) {
        Ok(())
    } else {
        warn!(field, "rejected identifier");
        Err(CadenceError::invalid_field(
            field,
            format!(
                "{} must be 1-128 characters of letters, digits, '_', '.', ':', '@' or '-'",
                field
            ),
        ))
    }
}

fn validate_non_empty(field: &'static str, value: &str) -> CadenceResult<()> {
    if value.trim().is_empty() {
        warn!(field, "rejected empty value");
        Err(CadenceError::invalid_field(field, format!("{} must be a non-empty string", field)))
    } else {
        Ok(())
    }
}
