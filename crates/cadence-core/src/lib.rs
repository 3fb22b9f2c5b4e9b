//! cadence-core - Adaptive spaced-repetition scheduling.
//!
//! This crate tracks per-learner memory state for learning items, decides
//! when each item should next be reviewed, updates that state from graded
//! review outcomes and aggregates learner statistics.
//!
//! # Example
//!
//! ```ignore
//! use cadence_core::{NewItem, ReviewOutcome, Scheduler, SchedulerConfig};
//!
//! let scheduler = Scheduler::from_config(SchedulerConfig::from_env()?)?;
//! let item = scheduler.schedule_item(NewItem::new("brett", "node.ser", "production"), now)?;
//!
//! // Grade a review and fetch what is due next
//! scheduler.apply_review(ReviewOutcome::new(&item.item_id, 4).at(now))?;
//! let due = scheduler.get_due_items("brett", 10, now)?;
//! ```

pub mod cognitive;
pub mod config;
pub mod envelope;
pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use cognitive::{MemoryModel, Scheduler};
pub use config::{ModelParams, SchedulerConfig, StorageBackend, StorageConfig};
pub use envelope::{Envelope, ErrorBody};
pub use error::{CadenceError, CadenceResult, ErrorKind};
pub use store::{InMemoryItemStore, ItemStore, SqliteItemStore};
pub use types::{
    CardState, Grade, LearnerStats, LearningItem, NewItem, ReviewLog, ReviewOutcome,
};
