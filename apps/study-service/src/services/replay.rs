//! Rebuilding stored scheduling state from the review log.

use srs_core::{replay_events, CardSchedulingState};
use uuid::Uuid;

use crate::db::StudyStore;
use crate::error::{Result, StudyError};
use crate::services::study::StudyService;

impl<S: StudyStore> StudyService<S> {
    /// Recompute a card's state from its events and store it.
    pub async fn rebuild_card_state(&self, card_id: Uuid) -> Result<CardSchedulingState> {
        let due = self
            .store
            .fetch_card(card_id)
            .await?
            .ok_or_else(|| StudyError::NotFound(format!("Card {card_id}")))?;
        let events = self.store.fetch_card_events(card_id).await?;

        let rebuilt = replay_events(self.algorithm.as_ref(), due.card.created_at, &events);
        if rebuilt != due.state {
            tracing::info!(%card_id, events = events.len(), "Stored state differed from replay; replaced");
        }
        self.store.replace_card_state(card_id, &rebuilt).await?;
        Ok(rebuilt)
    }

    /// Rebuild every card in a deck. Returns the number of cards processed.
    pub async fn rebuild_deck(&self, deck_id: Uuid) -> Result<usize> {
        self.require_deck(deck_id).await?;
        let cards = self.store.fetch_cards_in_deck(deck_id).await?;

        for due in &cards {
            self.rebuild_card_state(due.card.id).await?;
        }

        tracing::info!(%deck_id, cards = cards.len(), "Rebuilt deck from review log");
        Ok(cards.len())
    }
}
