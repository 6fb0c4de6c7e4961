//! Statistics and interval previews.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use srs_core::{deck_summary, preview_intervals, streak_days, study_stats, DeckSummary, IntervalPreview, StudyStats};
use uuid::Uuid;

use crate::db::StudyStore;
use crate::error::{Result, StudyError};
use crate::services::study::StudyService;

/// Which events a stats query covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsScope {
    /// Restrict to one deck; all decks when unset.
    pub deck_id: Option<Uuid>,
    /// Window length in days; the configured default when unset.
    pub window_days: Option<u32>,
}

impl StatsScope {
    pub fn deck(deck_id: Uuid) -> Self {
        Self {
            deck_id: Some(deck_id),
            window_days: None,
        }
    }
}

/// Statistics for a user over a bounded window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyReport {
    #[serde(flatten)]
    pub stats: StudyStats,
    /// Consecutive days with reviews, counted within the window.
    pub streak_days: usize,
    pub window_days: u32,
}

impl<S: StudyStore> StudyService<S> {
    /// Aggregate a user's reviews over the scope's window.
    pub async fn get_study_stats(&self, user_id: Uuid, scope: StatsScope) -> Result<StudyReport> {
        let window_days = scope.window_days.unwrap_or(self.config.stats_window_days);
        if window_days == 0 {
            return Err(StudyError::Validation("stats window must be at least one day".to_string()));
        }

        let now = Utc::now();
        let since = now - Duration::days(i64::from(window_days));
        let events = self
            .bounded("stats query", self.config.query_timeout, async {
                let events = self
                    .store
                    .fetch_review_events_since(user_id, scope.deck_id, since)
                    .await?;
                Ok::<_, StudyError>(events)
            })
            .await?;

        tracing::debug!(%user_id, deck_id = ?scope.deck_id, events = events.len(), window_days, "Computed study stats");

        Ok(StudyReport {
            stats: study_stats(&events),
            streak_days: streak_days(&events, now.date_naive()),
            window_days,
        })
    }

    /// Card counts and scheduling averages for a deck.
    pub async fn get_deck_stats(&self, deck_id: Uuid) -> Result<DeckSummary> {
        let cards = self
            .bounded("deck stats query", self.config.query_timeout, async {
                self.require_deck(deck_id).await?;
                Ok::<_, StudyError>(self.store.fetch_cards_in_deck(deck_id).await?)
            })
            .await?;
        Ok(deck_summary(&cards, Utc::now()))
    }

    /// What each grade would do to a card right now.
    pub async fn preview_intervals(&self, card_id: Uuid) -> Result<[IntervalPreview; 5]> {
        let due = self
            .store
            .fetch_card(card_id)
            .await?
            .ok_or_else(|| StudyError::NotFound(format!("Card {card_id}")))?;
        Ok(preview_intervals(self.algorithm.as_ref(), &due.state, Utc::now()))
    }
}
