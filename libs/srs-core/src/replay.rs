//! Rebuilding scheduling state from the review log.
//!
//! The event log is the source of truth: a card's state can always be
//! re-derived by replaying its events from the default state.

use chrono::{DateTime, Utc};

use crate::algorithm::SpacedRepetitionAlgorithm;
use crate::types::{CardSchedulingState, ReviewEvent};

/// Replay a card's events from scratch, ordered by `reviewed_at` then event id.
pub fn replay_events(
    algorithm: &dyn SpacedRepetitionAlgorithm,
    created_at: DateTime<Utc>,
    events: &[ReviewEvent],
) -> CardSchedulingState {
    let mut ordered: Vec<&ReviewEvent> = events.iter().collect();
    ordered.sort_by(|a, b| a.reviewed_at.cmp(&b.reviewed_at).then_with(|| a.id.cmp(&b.id)));

    ordered
        .into_iter()
        .fold(algorithm.initial_state(created_at), |state, event| {
            algorithm.apply(&state, event.quality, event.reviewed_at)
        })
}

/// Last-writer-by-`reviewed_at`: whether `incoming` should replace `current`.
///
/// Ties go to the incoming write.
pub fn should_replace(current: &CardSchedulingState, incoming: &CardSchedulingState) -> bool {
    match (current.last_reviewed_at, incoming.last_reviewed_at) {
        (Some(existing), Some(new)) => new >= existing,
        (Some(_), None) => false,
        (None, _) => true,
    }
}
