//! Learner statistics aggregation.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use std::collections::BTreeSet;

use crate::types::{CardState, LearnerStats, LearningItem};

/// Inputs for one statistics computation.
pub(crate) struct StatsInput<'a> {
    pub learner_id: &'a str,
    pub items: &'a [LearningItem],
    /// Timestamps of every logged review for the learner.
    pub review_times: &'a [DateTime<Utc>],
    pub now: DateTime<Utc>,
    pub timezone: FixedOffset,
    pub mastered_stability_days: f32,
}

pub(crate) fn compute(input: &StatsInput<'_>) -> LearnerStats {
    let tz = &input.timezone;
    let today = local_date(input.now, tz);

    let mut stats = LearnerStats {
        learner_id: input.learner_id.to_string(),
        total_items: input.items.len(),
        ..Default::default()
    };

    let mut difficulty_sum = 0.0f64;
    let mut review_days: BTreeSet<NaiveDate> = input
        .review_times
        .iter()
        .map(|ts| local_date(*ts, tz))
        .collect();

    for item in input.items {
        match item.state {
            CardState::New => stats.new_count += 1,
            CardState::Learning => stats.learning_count += 1,
            CardState::Review => stats.review_count += 1,
            CardState::Relearning => stats.relearning_count += 1,
        }
        if item.is_due(input.now) {
            stats.due_count += 1;
        }
        if item.stability > input.mastered_stability_days {
            stats.mastered_count += 1;
        }
        difficulty_sum += f64::from(item.difficulty);

        if let Some(last) = item.last_review {
            let day = local_date(last, tz);
            if day == today {
                stats.reviews_today += 1;
            }
            review_days.insert(day);
        }
    }

    if !input.items.is_empty() {
        stats.average_difficulty = (difficulty_sum / input.items.len() as f64) as f32;
    }
    stats.streak_days = current_streak(&review_days, today);
    stats
}

fn local_date(ts: DateTime<Utc>, tz: &FixedOffset) -> NaiveDate {
    ts.with_timezone(tz).date_naive()
}

/// Consecutive days with a review ending today, or yesterday when today has
/// none yet.
pub(crate) fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut check_date = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while days.contains(&check_date) {
        streak += 1;
        check_date = check_date - Duration::days(1);
    }
    streak
}
