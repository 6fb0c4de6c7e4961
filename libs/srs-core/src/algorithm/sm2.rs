//! SM-2 spaced repetition algorithm.
//!
//! Based on SuperMemo 2 with a 0-4 grade scale and configurable parameters.

use super::SpacedRepetitionAlgorithm;
use crate::types::{CardSchedulingState, CardStatus, Quality};
use chrono::{DateTime, Duration, Utc};

/// SM-2 algorithm with configurable parameters.
#[derive(Debug, Clone)]
pub struct Sm2 {
    pub initial_ease: f64,
    pub minimum_ease: f64,
    /// Interval after the first consecutive pass.
    pub first_interval: u32,
    /// Interval after the second consecutive pass.
    pub second_interval: u32,
    /// Interval after a failing grade.
    pub relearn_interval: u32,
    /// Lowest grade that counts as a pass.
    pub pass_threshold: Quality,
}

impl Default for Sm2 {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            minimum_ease: 1.3,
            first_interval: 1,
            second_interval: 6,
            relearn_interval: 1,
            pass_threshold: Quality::Good,
        }
    }
}

impl SpacedRepetitionAlgorithm for Sm2 {
    fn name(&self) -> &'static str {
        "sm2"
    }

    fn initial_state(&self, created_at: DateTime<Utc>) -> CardSchedulingState {
        CardSchedulingState {
            ease_factor: self.initial_ease,
            ..CardSchedulingState::new(created_at)
        }
    }

    fn apply(
        &self,
        state: &CardSchedulingState,
        quality: Quality,
        reviewed_at: DateTime<Utc>,
    ) -> CardSchedulingState {
        let (status, interval_days, ease_factor, repetitions) = if quality >= self.pass_threshold {
            self.schedule_pass(state, quality)
        } else {
            (
                CardStatus::Learning,
                self.relearn_interval,
                state.ease_factor,
                0,
            )
        };

        CardSchedulingState {
            status,
            ease_factor,
            interval_days,
            repetitions,
            due_at: reviewed_at + Duration::days(i64::from(interval_days)),
            last_reviewed_at: Some(reviewed_at),
        }
    }
}

impl Sm2 {
    fn schedule_pass(&self, state: &CardSchedulingState, quality: Quality) -> (CardStatus, u32, f64, u32) {
        let repetitions = state.repetitions + 1;

        // Interval grows from the ease factor held before this review.
        let interval = match repetitions {
            1 => self.first_interval,
            2 => self.second_interval,
            _ => {
                let grown = (f64::from(state.interval_days) * state.ease_factor).round();
                (grown as u32).max(1)
            }
        };

        let status = if repetitions >= 2 {
            CardStatus::Review
        } else {
            CardStatus::Learning
        };

        (status, interval, self.next_ease(state.ease_factor, quality), repetitions)
    }

    /// EF' = EF + (0.1 - (4 - q) * (0.08 + (4 - q) * 0.02)), floored at the minimum.
    pub fn next_ease(&self, ease_factor: f64, quality: Quality) -> f64 {
        let distance = f64::from(4 - quality.to_value());
        let delta = 0.1 - distance * (0.08 + distance * 0.02);
        (ease_factor + delta).max(self.minimum_ease)
    }
}
