//! Test fixtures and factory functions for creating test data.

use chrono::{DateTime, Duration, Utc};
use srs_core::{Card, CardSchedulingState, CardStatus, Quality, ReviewEvent};
use uuid::Uuid;

use study_service::db::StudyStore;

use super::TestContext;

/// Insert `count` new cards into the context's deck.
pub fn add_new_cards(ctx: &TestContext, count: usize) -> Vec<Card> {
    (0..count)
        .map(|i| {
            let card = Card::new(
                ctx.deck_id,
                ctx.user_id,
                format!("Question {}?", i + 1),
                format!("Answer {}.", i + 1),
                Utc::now() - Duration::days(10),
            );
            ctx.store.inner().insert_card(&card).expect("Failed to insert card");
            card
        })
        .collect()
}

/// A review-phase state that fell due `overdue_days` ago (negative: not yet due).
pub fn review_state(overdue_days: i64) -> CardSchedulingState {
    let due_at = Utc::now() - Duration::days(overdue_days);
    CardSchedulingState {
        status: CardStatus::Review,
        ease_factor: 2.5,
        interval_days: 6,
        repetitions: 2,
        due_at,
        last_reviewed_at: Some(due_at - Duration::days(6)),
    }
}

/// Insert `count` review cards, each due `overdue_days` ago.
pub async fn add_review_cards(ctx: &TestContext, count: usize, overdue_days: i64) -> Vec<Card> {
    let cards = add_new_cards(ctx, count);
    for card in &cards {
        ctx.store
            .replace_card_state(card.id, &review_state(overdue_days))
            .await
            .expect("Failed to set card state");
    }
    cards
}

/// Record a review directly in the store, bypassing any session.
pub async fn record_review(
    ctx: &TestContext,
    card_id: Uuid,
    quality: Quality,
    reviewed_at: DateTime<Utc>,
) -> ReviewEvent {
    let before = ctx
        .store
        .fetch_card(card_id)
        .await
        .expect("Failed to fetch card")
        .expect("Card should exist")
        .state;
    let after = ctx.service.algorithm().apply(&before, quality, reviewed_at);
    let event = ReviewEvent::new(card_id, ctx.user_id, quality, 1_500, &before, &after, reviewed_at);
    ctx.store
        .commit_review(&event, &after)
        .await
        .expect("Failed to commit review");
    event
}
