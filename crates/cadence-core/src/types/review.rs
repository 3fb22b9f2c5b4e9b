//! Review inputs and the review log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CardState;
use crate::error::{CadenceError, CadenceResult};

/// Highest accepted quality score.
pub const MAX_QUALITY: i32 = 5;

/// Quality below this is a failed review.
pub const PASS_THRESHOLD: i32 = 2;

/// Outcome of a graded review, as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub item_id: String,
    /// 0-5: 0-1 fail, 2 hard, 3 good, 4-5 easy.
    pub quality: i32,
    /// Defaults to the current time when absent.
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ReviewOutcome {
    pub fn new(item_id: impl Into<String>, quality: i32) -> Self {
        Self {
            item_id: item_id.into(),
            quality,
            reviewed_at: None,
        }
    }

    pub fn at(mut self, reviewed_at: DateTime<Utc>) -> Self {
        self.reviewed_at = Some(reviewed_at);
        self
    }
}

/// Grade bucket of a quality score.
///
/// Quality 2 is a (hard) pass and never counts as a lapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    /// Quality 0-1.
    Fail,
    /// Quality 2.
    Hard,
    /// Quality 3.
    Good,
    /// Quality 4-5.
    Easy,
}

impl Grade {
    /// Bucket a raw quality score. Out-of-range scores are rejected, not clamped.
    pub fn from_quality(quality: i32) -> CadenceResult<Self> {
        match quality {
            0 | 1 => Ok(Grade::Fail),
            2 => Ok(Grade::Hard),
            3 => Ok(Grade::Good),
            4 | 5 => Ok(Grade::Easy),
            _ => Err(CadenceError::invalid_field(
                "quality",
                format!(
                    "quality must be an integer between 0 and {}, got {}",
                    MAX_QUALITY, quality
                ),
            )),
        }
    }

    pub fn is_pass(self) -> bool {
        self != Grade::Fail
    }
}

impl TryFrom<i32> for Grade {
    type Error = CadenceError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Grade::from_quality(value)
    }
}

/// One applied review, recorded atomically with the item update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
    pub item_id: String,
    pub learner_id: String,
    pub quality: u8,
    pub state_before: CardState,
    pub state_after: CardState,
    pub elapsed_days: u32,
    pub scheduled_days: u32,
    pub stability: f32,
    pub difficulty: f32,
    pub reviewed_at: DateTime<Utc>,
}
