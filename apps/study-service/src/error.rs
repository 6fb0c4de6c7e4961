//! Error handling for the study service

use chrono::{DateTime, Utc};
use serde::Serialize;
use srs_core::CoreError;
use thiserror::Error;
use uuid::Uuid;

use crate::db::StoreError;

/// Study service error types
#[derive(Debug, Error)]
pub enum StudyError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Deck {0} has no studyable cards")]
    EmptyDeck(Uuid),

    #[error("Persistence error: {0}")]
    Persistence(StoreError),

    #[error("Timed out after {timeout_ms}ms: {operation}")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Invalid session state: {0}")]
    InvalidSessionState(CoreError),
}

impl StudyError {
    /// Whether retrying the same call may succeed. The session is left
    /// untouched by every error, so a retry starts from the same card.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Timeout { .. })
    }

    /// Map a core error raised while working on `deck_id`.
    pub(crate) fn from_core(err: CoreError, deck_id: Uuid) -> Self {
        match err {
            CoreError::EmptyDeck => Self::EmptyDeck(deck_id),
            other => other.into(),
        }
    }
}

impl From<CoreError> for StudyError {
    fn from(err: CoreError) -> Self {
        if err.is_validation() {
            return Self::Validation(err.to_string());
        }
        match err {
            CoreError::EmptyDeck => Self::EmptyDeck(Uuid::nil()),
            other => Self::InvalidSessionState(other),
        }
    }
}

impl From<StoreError> for StudyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CardNotFound(id) => Self::NotFound(format!("Card {id}")),
            other => Self::Persistence(other),
        }
    }
}

/// Non-fatal conditions reported alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum StudyWarning {
    /// The review was recorded, but a later review of the same card already
    /// owns its scheduling state.
    ConcurrencyConflict {
        card_id: Uuid,
        current_reviewed_at: DateTime<Utc>,
    },
}

/// Result type alias for study operations
pub type Result<T> = std::result::Result<T, StudyError>;
