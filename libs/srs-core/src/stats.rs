//! Study statistics aggregated from review history.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::types::{CardStatus, DueCard, ReviewEvent};

/// Reviews on one calendar date (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub reviews: usize,
    pub correct: usize,
}

/// Aggregate statistics over a window of review events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyStats {
    pub total_reviews: usize,
    pub correct_reviews: usize,
    /// Percentage of reviews graded as recalled, 0 when there are none.
    pub retention_rate: f64,
    pub average_response_time_ms: u64,
    /// Ascending by date.
    pub chart_data: Vec<ChartPoint>,
}

/// Card counts for a deck.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeckSummary {
    pub total_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub review_cards: usize,
    pub suspended_cards: usize,
    pub due_now: usize,
    pub average_ease: f64,
    pub average_interval: f64,
}

/// Aggregate `events` into totals and a per-day series.
pub fn study_stats(events: &[ReviewEvent]) -> StudyStats {
    let mut by_date: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    let mut correct_reviews = 0;
    let mut response_total: u64 = 0;

    for event in events {
        let passed = event.quality.is_pass();
        let entry = by_date.entry(event.reviewed_at.date_naive()).or_default();
        entry.0 += 1;
        if passed {
            entry.1 += 1;
            correct_reviews += 1;
        }
        response_total = response_total.saturating_add(event.response_time_ms);
    }

    let total_reviews = events.len();
    let (retention_rate, average_response_time_ms) = if total_reviews == 0 {
        (0.0, 0)
    } else {
        (
            100.0 * correct_reviews as f64 / total_reviews as f64,
            response_total / total_reviews as u64,
        )
    };

    StudyStats {
        total_reviews,
        correct_reviews,
        retention_rate,
        average_response_time_ms,
        chart_data: by_date
            .into_iter()
            .map(|(date, (reviews, correct))| ChartPoint {
                date,
                reviews,
                correct,
            })
            .collect(),
    }
}

/// Consecutive days with at least one review, ending today.
///
/// A day without reviews yet does not break the streak until it is over,
/// so counting may start from yesterday.
pub fn streak_days(events: &[ReviewEvent], today: NaiveDate) -> usize {
    let days: HashSet<NaiveDate> = events.iter().map(|e| e.reviewed_at.date_naive()).collect();

    let mut current = today;
    if !days.contains(&current) {
        match current.pred_opt() {
            Some(yesterday) => current = yesterday,
            None => return 0,
        }
    }

    let mut streak = 0;
    while days.contains(&current) {
        streak += 1;
        match current.pred_opt() {
            Some(previous) => current = previous,
            None => break,
        }
    }
    streak
}

/// Summarise the scheduling state of a deck's cards.
pub fn deck_summary(cards: &[DueCard], now: DateTime<Utc>) -> DeckSummary {
    let mut summary = DeckSummary {
        total_cards: cards.len(),
        new_cards: 0,
        learning_cards: 0,
        review_cards: 0,
        suspended_cards: 0,
        due_now: 0,
        average_ease: 2.5,
        average_interval: 0.0,
    };

    let mut ease_total = 0.0;
    let mut interval_total = 0u64;
    let mut with_interval = 0u64;

    for c in cards {
        match c.state.status {
            CardStatus::New => summary.new_cards += 1,
            CardStatus::Learning => summary.learning_cards += 1,
            CardStatus::Review => summary.review_cards += 1,
        }
        if c.card.suspended {
            summary.suspended_cards += 1;
        } else if c.state.status != CardStatus::New && c.state.due_at <= now {
            summary.due_now += 1;
        }
        ease_total += c.state.ease_factor;
        if c.state.interval_days > 0 {
            interval_total += u64::from(c.state.interval_days);
            with_interval += 1;
        }
    }

    if !cards.is_empty() {
        summary.average_ease = ease_total / cards.len() as f64;
    }
    if with_interval > 0 {
        summary.average_interval = interval_total as f64 / with_interval as f64;
    }
    summary
}
