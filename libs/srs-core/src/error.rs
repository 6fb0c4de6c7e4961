//! Error types for srs-core.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the scheduling core.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("invalid quality {0}: expected a grade from 0 to 4")]
    InvalidQuality(i64),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("deck has no studyable cards")]
    EmptyDeck,

    #[error("card {got} is not the active card (active: {expected})")]
    InactiveCard { expected: Uuid, got: Uuid },

    #[error("session is paused")]
    SessionPaused,

    #[error("session is complete")]
    SessionComplete,

    #[error("answer has not been revealed")]
    NotRevealed,

    #[error("prepared review no longer matches the session")]
    StaleSubmission,
}

impl CoreError {
    /// Whether this error is a validation failure of caller input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidQuality(_) | Self::InvalidSettings(_))
    }
}
