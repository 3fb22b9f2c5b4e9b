//! Core types for cadence.

mod item;
mod review;
mod stats;

pub use item::{CardState, LearningItem, NewItem};
pub use review::{Grade, ReviewLog, ReviewOutcome, MAX_QUALITY, PASS_THRESHOLD};
pub use stats::LearnerStats;
