//! Spaced repetition scheduling.

pub mod preview;
pub mod sm2;

use crate::error::Result;
use crate::types::{CardSchedulingState, Quality};
use chrono::{DateTime, Utc};

pub use preview::{format_interval, preview_intervals, quality_info, IntervalPreview, QualityInfo};
pub use sm2::Sm2;

/// Trait for spaced repetition algorithms.
///
/// Implementations are pure: the same state, grade and timestamp always
/// produce the same next state.
pub trait SpacedRepetitionAlgorithm: Send + Sync {
    /// Algorithm identifier.
    fn name(&self) -> &'static str;

    /// Calculate the next scheduling state after a review.
    fn apply(
        &self,
        state: &CardSchedulingState,
        quality: Quality,
        reviewed_at: DateTime<Utc>,
    ) -> CardSchedulingState;

    /// Initial state for a card created at `created_at`.
    fn initial_state(&self, created_at: DateTime<Utc>) -> CardSchedulingState;

    /// Like [`apply`](Self::apply), but takes an unchecked numeric grade.
    fn apply_value(
        &self,
        state: &CardSchedulingState,
        quality: i64,
        reviewed_at: DateTime<Utc>,
    ) -> Result<CardSchedulingState> {
        let quality = Quality::from_value(quality)?;
        Ok(self.apply(state, quality, reviewed_at))
    }
}

/// Get algorithm by name.
pub fn get_algorithm(name: &str) -> Option<Box<dyn SpacedRepetitionAlgorithm>> {
    match name {
        "sm2" => Some(Box::new(Sm2::default())),
        _ => None,
    }
}
