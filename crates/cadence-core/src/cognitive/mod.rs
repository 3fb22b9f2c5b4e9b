//! Scheduling core.
//!
//! The memory model is pure; the scheduler drives it against an injected
//! [`ItemStore`](crate::store::ItemStore).

mod model;
mod scheduler;
mod stats;

pub use model::{
    scheduled_days, MemoryModel, MemoryState, NextState, MAX_DIFFICULTY, MIN_DIFFICULTY,
};
pub use scheduler::{Scheduler, MAX_DUE_LIMIT, MIN_DUE_LIMIT};
