//! Memory model: retrievability and post-review state transitions.
//!
//! Retrievability follows the FSRS power forgetting curve
//! `R(t) = (1 + factor * t / S)^(-decay)` with `factor = 0.9^(-1/decay) - 1`,
//! so `R(S) = 0.9` and `R(0) = 1`. `decay` defaults to the FSRS-6 constant.
//!
//! Stability and difficulty updates use fixed per-grade multipliers and
//! deltas (see [`ModelParams`]). The model holds no mutable state and is safe
//! to share across threads.

use serde::{Deserialize, Serialize};

use crate::config::ModelParams;
use crate::error::{CadenceError, CadenceResult};
use crate::types::{CardState, Grade};

/// Lower difficulty bound.
pub const MIN_DIFFICULTY: f32 = 1.0;
/// Upper difficulty bound.
pub const MAX_DIFFICULTY: f32 = 10.0;

/// The subset of item state the model reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    pub stability: f32,
    pub difficulty: f32,
    pub state: CardState,
    /// Applied reviews before this one.
    pub reps: u32,
}

/// Result of applying one grade to a [`MemoryState`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NextState {
    pub stability: f32,
    pub difficulty: f32,
    pub state: CardState,
    /// Whether this review counts as a lapse.
    pub lapsed: bool,
    /// `max(1, round(stability))`.
    pub scheduled_days: u32,
}

/// Pure memory model.
#[derive(Debug, Clone)]
pub struct MemoryModel {
    params: ModelParams,
    min_reps_for_review: u32,
}

impl MemoryModel {
    /// Create a model with the given parameters.
    pub fn new(params: ModelParams, min_reps_for_review: u32) -> Self {
        Self {
            params,
            min_reps_for_review,
        }
    }

    /// Probability of recall after `elapsed_days` at the given stability.
    ///
    /// Exactly 1.0 at zero elapsed time; strictly decreasing in time and
    /// strictly increasing in stability for positive elapsed time.
    pub fn retrievability(&self, stability: f32, elapsed_days: f32) -> f32 {
        if elapsed_days <= 0.0 {
            return 1.0;
        }
        if stability <= 0.0 {
            return 0.0;
        }

        let mem_state = fsrs::MemoryState {
            stability,
            difficulty: MIN_DIFFICULTY, // Difficulty doesn't affect retrievability
        };
        fsrs::current_retrievability(mem_state, elapsed_days, self.params.decay).clamp(0.0, 1.0)
    }

    /// Compute the state after a review of the given grade.
    pub fn next_state(&self, current: &MemoryState, grade: Grade) -> CadenceResult<NextState> {
        let p = &self.params;
        let (factor, delta) = match grade {
            Grade::Fail => (p.fail_factor, p.fail_difficulty_delta),
            Grade::Hard => (p.hard_factor, p.hard_difficulty_delta),
            Grade::Good => (p.good_factor, p.good_difficulty_delta),
            Grade::Easy => (p.easy_factor, p.easy_difficulty_delta),
        };

        let max_interval = p.max_interval_days as f32;
        let mut stability = (current.stability * factor).max(p.min_stability);
        if stability > max_interval {
            stability = max_interval;
        }
        let difficulty = (current.difficulty + delta).clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        let state = self.next_card_state(current, grade);
        let lapsed = !grade.is_pass() && current.state.is_established();

        let next = NextState {
            stability,
            difficulty,
            state,
            lapsed,
            scheduled_days: scheduled_days(stability, p.max_interval_days),
        };
        check_invariants(&next)?;
        Ok(next)
    }

    fn next_card_state(&self, current: &MemoryState, grade: Grade) -> CardState {
        let reps_after = current.reps.saturating_add(1);

        match (current.state, grade.is_pass()) {
            (CardState::New | CardState::Learning, false) => CardState::Learning,
            (CardState::New | CardState::Learning, true) => {
                if reps_after >= self.min_reps_for_review {
                    CardState::Review
                } else {
                    CardState::Learning
                }
            }
            (CardState::Review | CardState::Relearning, false) => CardState::Relearning,
            (CardState::Review | CardState::Relearning, true) => CardState::Review,
        }
    }
}

/// Whole-day interval for a stability, between one day and `max_interval_days`.
pub fn scheduled_days(stability: f32, max_interval_days: u32) -> u32 {
    let days = stability.round();
    if days >= max_interval_days as f32 {
        max_interval_days
    } else {
        (days as u32).clamp(1, max_interval_days.max(1))
    }
}

fn check_invariants(next: &NextState) -> CadenceResult<()> {
    if !(next.stability.is_finite() && next.stability > 0.0) {
        tracing::error!(stability = next.stability, "memory model produced non-positive stability");
        return Err(CadenceError::invariant(format!(
            "computed stability {} is not positive",
            next.stability
        )));
    }
    if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&next.difficulty) {
        tracing::error!(difficulty = next.difficulty, "memory model produced out-of-range difficulty");
        return Err(CadenceError::invariant(format!(
            "computed difficulty {} is outside [{}, {}]",
            next.difficulty, MIN_DIFFICULTY, MAX_DIFFICULTY
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn model() -> MemoryModel {
        MemoryModel::new(ModelParams::default(), 2)
    }

    fn state(stability: f32, difficulty: f32, state: CardState, reps: u32) -> MemoryState {
        MemoryState {
            stability,
            difficulty,
            state,
            reps,
        }
    }

    #[test]
    fn test_retrievability_at_zero_elapsed() {
        let model = model();
        for s in [0.01, 1.0, 10.0, 365.0] {
            assert_eq!(model.retrievability(s, 0.0), 1.0);
        }
    }

    #[test]
    fn test_retrievability_at_stability_is_ninety_percent() {
        let r = model().retrievability(10.0, 10.0);
        assert!((r - 0.9).abs() < 0.01, "R(S) should be ~0.9, got {}", r);
    }

    #[test]
    fn test_retrievability_decreases_with_time() {
        let model = model();
        let mut previous = 1.0;
        for t in [0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 100.0] {
            let r = model.retrievability(5.0, t);
            assert!(r < previous, "R should decrease: R({}) = {} >= {}", t, r, previous);
            previous = r;
        }
    }

    #[test]
    fn test_retrievability_increases_with_stability() {
        let model = model();
        let mut previous = 0.0;
        for s in [0.5, 1.0, 2.0, 5.0, 10.0, 50.0] {
            let r = model.retrievability(s, 3.0);
            assert!(r > previous, "R should increase with S: R(S={}) = {}", s, r);
            previous = r;
        }
    }

    #[test]
    fn test_easy_from_new() {
        let next = model()
            .next_state(&state(2.0, 5.0, CardState::New, 0), Grade::Easy)
            .unwrap();
        assert_eq!(next.stability, 5.0);
        assert_eq!(next.difficulty, 4.0);
        assert_eq!(next.scheduled_days, 5);
        assert_eq!(next.state, CardState::Learning);
        assert!(!next.lapsed);
    }

    #[test]
    fn test_fail_from_review_is_a_lapse() {
        let next = model()
            .next_state(&state(8.0, 9.0, CardState::Review, 4), Grade::Fail)
            .unwrap();
        assert_eq!(next.stability, 4.0);
        assert_eq!(next.difficulty, 10.0);
        assert_eq!(next.state, CardState::Relearning);
        assert!(next.lapsed);
    }

    #[test]
    fn test_fail_from_learning_is_not_a_lapse() {
        let model = model();
        for from in [CardState::New, CardState::Learning] {
            let next = model.next_state(&state(2.0, 5.0, from, 1), Grade::Fail).unwrap();
            assert_eq!(next.state, CardState::Learning);
            assert!(!next.lapsed);
        }
    }

    #[test]
    fn test_fail_from_relearning_stays_and_lapses() {
        let next = model()
            .next_state(&state(4.0, 6.0, CardState::Relearning, 5), Grade::Fail)
            .unwrap();
        assert_eq!(next.state, CardState::Relearning);
        assert!(next.lapsed);
    }

    #[test]
    fn test_hard_and_good_updates() {
        let model = model();
        let hard = model
            .next_state(&state(10.0, 5.0, CardState::Review, 3), Grade::Hard)
            .unwrap();
        assert!((hard.stability - 12.0).abs() < 1e-4);
        assert_eq!(hard.difficulty, 5.5);
        assert_eq!(hard.scheduled_days, 12);
        assert!(!hard.lapsed);

        let good = model
            .next_state(&state(10.0, 5.0, CardState::Review, 3), Grade::Good)
            .unwrap();
        assert_eq!(good.stability, 15.0);
        assert_eq!(good.difficulty, 5.0);
    }

    #[test]
    fn test_promotion_needs_min_reps() {
        let model = model();
        let first = model
            .next_state(&state(2.0, 5.0, CardState::New, 0), Grade::Good)
            .unwrap();
        assert_eq!(first.state, CardState::Learning);

        let second = model
            .next_state(&state(3.0, 5.0, CardState::Learning, 1), Grade::Good)
            .unwrap();
        assert_eq!(second.state, CardState::Review);

        let eager = MemoryModel::new(ModelParams::default(), 1);
        let direct = eager
            .next_state(&state(2.0, 5.0, CardState::New, 0), Grade::Hard)
            .unwrap();
        assert_eq!(direct.state, CardState::Review);
    }

    #[test]
    fn test_pass_from_relearning_returns_to_review() {
        let next = model()
            .next_state(&state(4.0, 7.0, CardState::Relearning, 6), Grade::Hard)
            .unwrap();
        assert_eq!(next.state, CardState::Review);
    }

    #[test]
    fn test_repeated_fails_keep_stability_positive() {
        let model = model();
        let mut current = state(2.0, 5.0, CardState::Review, 1);
        for _ in 0..200 {
            let next = model.next_state(&current, Grade::Fail).unwrap();
            assert!(next.stability > 0.0);
            assert!(next.difficulty <= MAX_DIFFICULTY);
            current = state(next.stability, next.difficulty, next.state, current.reps + 1);
        }
        assert_eq!(current.stability, ModelParams::default().min_stability);
        assert_eq!(scheduled_days(current.stability, 36500), 1);
    }

    #[test]
    fn test_repeated_easy_keeps_difficulty_in_range() {
        let model = model();
        let mut current = state(1.0, 2.0, CardState::Review, 1);
        for _ in 0..10 {
            let next = model.next_state(&current, Grade::Easy).unwrap();
            assert!(next.difficulty >= MIN_DIFFICULTY);
            current = state(next.stability, next.difficulty, next.state, current.reps + 1);
        }
        assert_eq!(current.difficulty, MIN_DIFFICULTY);
    }

    #[test]
    fn test_scheduled_days_rounds_with_floor_of_one() {
        assert_eq!(scheduled_days(0.01, 36500), 1);
        assert_eq!(scheduled_days(1.49, 36500), 1);
        assert_eq!(scheduled_days(1.5, 36500), 2);
        assert_eq!(scheduled_days(5.0, 36500), 5);
    }

    #[test]
    fn test_interval_capped_at_maximum() {
        assert_eq!(scheduled_days(1e9, 36500), 36500);
        assert_eq!(scheduled_days(f32::INFINITY, 36500), 36500);

        let model = model();
        let mut current = state(2.0, 5.0, CardState::Review, 1);
        for _ in 0..25 {
            let next = model.next_state(&current, Grade::Easy).unwrap();
            assert!(next.stability <= 36500.0);
            assert!(next.scheduled_days <= 36500);
            current = state(next.stability, next.difficulty, next.state, current.reps + 1);
        }
        assert_eq!(current.stability, 36500.0);
    }

    #[test]
    fn test_invariant_violation_reported() {
        let params = ModelParams {
            min_stability: f32::NAN,
            ..Default::default()
        };
        let model = MemoryModel::new(params, 2);
        // f32::max ignores a single NaN operand, so both must be NaN
        let err = model
            .next_state(&state(f32::NAN, 5.0, CardState::Review, 1), Grade::Good)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }
}
