//! Display metadata for grades and what-if interval previews.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SpacedRepetitionAlgorithm;
use crate::types::{CardSchedulingState, Quality};

/// Display metadata for a grade button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityInfo {
    pub quality: Quality,
    pub label: &'static str,
    pub color: &'static str,
    pub shortcut: char,
}

/// The interval a grade would produce, without applying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntervalPreview {
    pub quality: Quality,
    pub label: &'static str,
    pub interval_days: u32,
    pub formatted: String,
}

/// Look up display metadata for a grade.
pub fn quality_info(quality: Quality) -> QualityInfo {
    let (label, color, shortcut) = match quality {
        Quality::Again => ("Again", "#ef4444", '1'),
        Quality::Hard => ("Hard", "#f97316", '2'),
        Quality::Good => ("Good", "#22c55e", '3'),
        Quality::Easy => ("Easy", "#3b82f6", '4'),
        Quality::VeryEasy => ("Very Easy", "#a855f7", '5'),
    };
    QualityInfo {
        quality,
        label,
        color,
        shortcut,
    }
}

/// Preview the interval each of the five grades would give `state`.
pub fn preview_intervals(
    algorithm: &dyn SpacedRepetitionAlgorithm,
    state: &CardSchedulingState,
    now: DateTime<Utc>,
) -> [IntervalPreview; 5] {
    Quality::ALL.map(|quality| {
        let interval_days = algorithm.apply(state, quality, now).interval_days;
        IntervalPreview {
            quality,
            label: quality_info(quality).label,
            interval_days,
            formatted: format_interval(interval_days),
        }
    })
}

/// Format an interval in days to a short human-readable string.
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=6 => format!("{}d", days),
        7..=29 => format!("{}w", days / 7),
        30..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}
