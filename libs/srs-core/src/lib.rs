//! Spaced-repetition engine shared by study front-ends.
//!
//! Provides:
//! - SM-2 scheduler with configurable constants and interval previews
//! - Due-set selection under daily quotas
//! - Review session state machine with pause/resume
//! - Study statistics and event-log replay

pub mod algorithm;
pub mod date_utils;
pub mod due;
pub mod error;
pub mod replay;
pub mod session;
pub mod stats;
pub mod types;

pub use algorithm::{
    format_interval, get_algorithm, preview_intervals, quality_info, IntervalPreview, QualityInfo,
    Sm2, SpacedRepetitionAlgorithm,
};
pub use due::{select_due_cards, select_free_study, DailyUsage, DueSet};
pub use error::{CoreError, Result};
pub use replay::{replay_events, should_replace};
pub use session::{
    Advance, CardPhase, PreparedReview, ReviewSession, SessionCounters, SessionState,
    SessionSummary, StudyMode,
};
pub use stats::{deck_summary, streak_days, study_stats, ChartPoint, DeckSummary, StudyStats};
pub use types::{
    Card, CardSchedulingState, CardStatus, Deck, DueCard, DueOptions, Quality, ReviewEvent,
    ReviewOrder, UserSchedulingSettings,
};
