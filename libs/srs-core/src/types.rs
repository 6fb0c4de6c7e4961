//! Core types for the spaced-repetition engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Card learning status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    New,
    Learning,
    Review,
}

impl Default for CardStatus {
    fn default() -> Self {
        Self::New
    }
}

impl CardStatus {
    /// Get the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "learning" => Some(Self::Learning),
            "review" => Some(Self::Review),
            _ => None,
        }
    }
}

/// Self-reported recall grade for one review.
///
/// Values below [`Quality::Good`] are failing grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Again,
    Hard,
    Good,
    Easy,
    VeryEasy,
}

impl Quality {
    /// All grades in ascending order.
    pub const ALL: [Quality; 5] = [
        Self::Again,
        Self::Hard,
        Self::Good,
        Self::Easy,
        Self::VeryEasy,
    ];

    /// Convert to the numeric grade (0-4).
    pub fn to_value(self) -> u8 {
        match self {
            Self::Again => 0,
            Self::Hard => 1,
            Self::Good => 2,
            Self::Easy => 3,
            Self::VeryEasy => 4,
        }
    }

    /// Create from a numeric grade, rejecting anything outside 0-4.
    pub fn from_value(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Again),
            1 => Ok(Self::Hard),
            2 => Ok(Self::Good),
            3 => Ok(Self::Easy),
            4 => Ok(Self::VeryEasy),
            other => Err(CoreError::InvalidQuality(other)),
        }
    }

    /// Whether this grade counts as recalled.
    pub fn is_pass(self) -> bool {
        self >= Self::Good
    }
}

impl TryFrom<u8> for Quality {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_value(i64::from(value))
    }
}

/// A flashcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub owner_id: Uuid,
    pub front: String,
    pub back: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub suspended: bool,
}

impl Card {
    /// Create an unsuspended card with no media or tags.
    pub fn new(
        deck_id: Uuid,
        owner_id: Uuid,
        front: impl Into<String>,
        back: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            deck_id,
            owner_id,
            front: front.into(),
            back: back.into(),
            media: Vec::new(),
            tags: Vec::new(),
            created_at,
            suspended: false,
        }
    }
}

/// Scheduling state of a card. Exactly one per card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSchedulingState {
    pub status: CardStatus,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub due_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl CardSchedulingState {
    /// Default state for a card created at `created_at`.
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            status: CardStatus::New,
            ease_factor: 2.5,
            interval_days: 0,
            repetitions: 0,
            due_at: created_at,
            last_reviewed_at: None,
        }
    }

    /// Whether the card is eligible by date at `now`. New cards are always due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == CardStatus::New || self.due_at <= now
    }
}

/// A card together with its scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueCard {
    pub card: Card,
    pub state: CardSchedulingState,
}

/// Deck metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
}

/// Immutable record of one review, with a before/after snapshot of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub id: Uuid,
    pub card_id: Uuid,
    pub user_id: Uuid,
    pub quality: Quality,
    pub response_time_ms: u64,
    pub reviewed_at: DateTime<Utc>,
    pub status_before: CardStatus,
    pub status_after: CardStatus,
    pub interval_before: u32,
    pub interval_after: u32,
    pub ease_before: f64,
    pub ease_after: f64,
}

impl ReviewEvent {
    /// Build an event from the states on either side of a review.
    pub fn new(
        card_id: Uuid,
        user_id: Uuid,
        quality: Quality,
        response_time_ms: u64,
        before: &CardSchedulingState,
        after: &CardSchedulingState,
        reviewed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            card_id,
            user_id,
            quality,
            response_time_ms,
            reviewed_at,
            status_before: before.status,
            status_after: after.status,
            interval_before: before.interval_days,
            interval_after: after.interval_days,
            ease_before: before.ease_factor,
            ease_after: after.ease_factor,
        }
    }

    /// Whether the review introduced a new card.
    pub fn introduced_new_card(&self) -> bool {
        self.status_before == CardStatus::New
    }
}

/// Order in which a due set is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOrder {
    Random,
    DueDate,
    NewFirst,
    ReviewFirst,
}

impl Default for ReviewOrder {
    fn default() -> Self {
        Self::Random
    }
}

impl ReviewOrder {
    /// Get the order name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::DueDate => "due_date",
            Self::NewFirst => "new_first",
            Self::ReviewFirst => "review_first",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "random" => Some(Self::Random),
            "due_date" => Some(Self::DueDate),
            "new_first" => Some(Self::NewFirst),
            "review_first" => Some(Self::ReviewFirst),
            _ => None,
        }
    }
}

/// Per-user scheduling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSchedulingSettings {
    pub new_cards_per_day: u32,
    pub max_reviews_per_day: u32,
    pub review_order: ReviewOrder,
    pub daily_reset_hour: u32,
    pub show_remaining_count: bool,
    pub show_next_intervals: bool,
    pub auto_play_audio: bool,
}

impl Default for UserSchedulingSettings {
    fn default() -> Self {
        Self {
            new_cards_per_day: 20,
            max_reviews_per_day: 200,
            review_order: ReviewOrder::default(),
            daily_reset_hour: 0,
            show_remaining_count: true,
            show_next_intervals: true,
            auto_play_audio: false,
        }
    }
}

impl UserSchedulingSettings {
    /// Reject settings the selector cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.daily_reset_hour > 23 {
            return Err(CoreError::InvalidSettings(format!(
                "daily_reset_hour must be 0-23, got {}",
                self.daily_reset_hour
            )));
        }
        Ok(())
    }
}

/// Options for a due-set query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueOptions {
    pub include_new: bool,
    pub include_learning: bool,
    pub include_review: bool,
    /// Overrides the user's configured order when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<ReviewOrder>,
}

impl Default for DueOptions {
    fn default() -> Self {
        Self {
            include_new: true,
            include_learning: true,
            include_review: true,
            order: None,
        }
    }
}
