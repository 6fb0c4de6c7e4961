//! Persistence boundary for the study service.

pub mod error;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use srs_core::{CardSchedulingState, Deck, DueCard, ReviewEvent, UserSchedulingSettings};
use uuid::Uuid;

pub use error::StoreError;
pub use sqlite::SqliteStore;

pub type Result<T> = std::result::Result<T, StoreError>;

/// How a committed review affected the stored scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Event appended and state updated.
    Applied,
    /// Event appended, but a review with a later `reviewed_at` already owns the state.
    Superseded { current_reviewed_at: DateTime<Utc> },
    /// An event with this id was already committed; nothing changed.
    Duplicate,
}

/// Collaborator layer the study service reads from and commits to.
#[async_trait]
pub trait StudyStore: Send + Sync {
    async fn fetch_deck(&self, deck_id: Uuid) -> Result<Option<Deck>>;

    async fn fetch_card(&self, card_id: Uuid) -> Result<Option<DueCard>>;

    async fn fetch_cards_in_deck(&self, deck_id: Uuid) -> Result<Vec<DueCard>>;

    /// A user's events reviewed at or after `since`, oldest first.
    async fn fetch_review_events_since(
        &self,
        user_id: Uuid,
        deck_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReviewEvent>>;

    /// Every event recorded for a card, oldest first.
    async fn fetch_card_events(&self, card_id: Uuid) -> Result<Vec<ReviewEvent>>;

    /// Append `event` and upsert the card's state as one atomic unit.
    async fn commit_review(
        &self,
        event: &ReviewEvent,
        new_state: &CardSchedulingState,
    ) -> Result<CommitOutcome>;

    /// Overwrite a card's state, used when rebuilding from the event log.
    async fn replace_card_state(&self, card_id: Uuid, state: &CardSchedulingState) -> Result<()>;

    /// Stored settings, or the defaults when the user has none.
    async fn fetch_user_scheduling_settings(&self, user_id: Uuid) -> Result<UserSchedulingSettings>;
}
