//! Due-set selection under daily quotas.
//!
//! Quotas are recomputed from the day's review events on every call, so
//! an abandoned session never leaves a stale counter behind.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::types::{CardStatus, DueCard, DueOptions, ReviewEvent, ReviewOrder, UserSchedulingSettings};

/// Quota consumed so far in the current study day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DailyUsage {
    /// Distinct new cards introduced.
    pub new_introduced: u32,
    /// Reviews of cards that were already past `new`.
    pub reviews_done: u32,
}

impl DailyUsage {
    /// Tally events reviewed at or after `day_start`.
    pub fn from_events(events: &[ReviewEvent], day_start: DateTime<Utc>) -> Self {
        let mut introduced = HashSet::new();
        let mut reviews_done = 0u32;

        for event in events.iter().filter(|e| e.reviewed_at >= day_start) {
            if event.introduced_new_card() {
                introduced.insert(event.card_id);
            } else {
                reviews_done += 1;
            }
        }

        Self {
            new_introduced: introduced.len() as u32,
            reviews_done,
        }
    }
}

/// Ordered set of cards eligible for review now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueSet {
    pub cards: Vec<DueCard>,
    pub new_count: usize,
    pub review_count: usize,
    /// New-card quota left after this set is studied.
    pub new_remaining: u32,
    /// Review quota left after this set is studied.
    pub review_remaining: u32,
}

impl DueSet {
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Select the due set for `now` from every card in a deck.
///
/// `today_events` are the user's review events for the current study day;
/// older events are ignored. Fails with [`CoreError::EmptyDeck`] only when
/// the deck has no unsuspended cards at all. Nothing being due is an empty
/// success.
pub fn select_due_cards<R: Rng + ?Sized>(
    cards: Vec<DueCard>,
    today_events: &[ReviewEvent],
    day_start: DateTime<Utc>,
    settings: &UserSchedulingSettings,
    options: &DueOptions,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<DueSet> {
    settings.validate()?;
    let active = unsuspended(cards)?;
    let usage = DailyUsage::from_events(today_events, day_start);
    let order = options.order.unwrap_or(settings.review_order);

    let new_quota = settings.new_cards_per_day.saturating_sub(usage.new_introduced);
    let review_quota = settings.max_reviews_per_day.saturating_sub(usage.reviews_done);

    let (mut new_cards, mut due_cards): (Vec<DueCard>, Vec<DueCard>) = active
        .into_iter()
        .filter(|c| is_eligible(c, options, now))
        .partition(|c| c.state.status == CardStatus::New);

    order_cards(&mut new_cards, order, rng);
    new_cards.truncate(new_quota as usize);
    order_cards(&mut due_cards, order, rng);
    due_cards.truncate(review_quota as usize);

    let new_count = new_cards.len();
    let review_count = due_cards.len();

    let cards = match order {
        ReviewOrder::ReviewFirst => due_cards.into_iter().chain(new_cards).collect(),
        _ => {
            let mut combined: Vec<DueCard> = new_cards.into_iter().chain(due_cards).collect();
            if order != ReviewOrder::NewFirst {
                order_cards(&mut combined, order, rng);
            }
            combined
        }
    };

    Ok(DueSet {
        cards,
        new_count,
        review_count,
        new_remaining: new_quota - new_count as u32,
        review_remaining: review_quota - review_count as u32,
    })
}

/// Every unsuspended card in a deck, ignoring due dates and quotas.
pub fn select_free_study<R: Rng + ?Sized>(
    cards: Vec<DueCard>,
    order: ReviewOrder,
    rng: &mut R,
) -> Result<Vec<DueCard>> {
    let mut active = unsuspended(cards)?;
    order_cards(&mut active, order, rng);
    Ok(active)
}

fn unsuspended(cards: Vec<DueCard>) -> Result<Vec<DueCard>> {
    let active: Vec<DueCard> = cards.into_iter().filter(|c| !c.card.suspended).collect();
    if active.is_empty() {
        return Err(CoreError::EmptyDeck);
    }
    Ok(active)
}

fn is_eligible(card: &DueCard, options: &DueOptions, now: DateTime<Utc>) -> bool {
    match card.state.status {
        CardStatus::New => options.include_new,
        CardStatus::Learning => options.include_learning && card.state.due_at <= now,
        CardStatus::Review => options.include_review && card.state.due_at <= now,
    }
}

fn order_cards<R: Rng + ?Sized>(cards: &mut [DueCard], order: ReviewOrder, rng: &mut R) {
    match order {
        ReviewOrder::Random => cards.shuffle(rng),
        ReviewOrder::DueDate | ReviewOrder::NewFirst | ReviewOrder::ReviewFirst => {
            cards.sort_by(|a, b| {
                a.state
                    .due_at
                    .cmp(&b.state.due_at)
                    .then_with(|| a.card.created_at.cmp(&b.card.created_at))
                    .then_with(|| a.card.id.cmp(&b.card.id))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Card, CardSchedulingState, Quality};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn day_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn card(status: CardStatus, due_offset_days: i64) -> DueCard {
        let created = now() - Duration::days(30);
        let mut state = CardSchedulingState::new(created);
        state.status = status;
        if status != CardStatus::New {
            state.interval_days = 3;
            state.repetitions = 2;
            state.due_at = now() + Duration::days(due_offset_days);
            state.last_reviewed_at = Some(state.due_at - Duration::days(3));
        }
        DueCard {
            card: Card::new(Uuid::nil(), Uuid::nil(), "front", "back", created),
            state,
        }
    }

    fn event(card_id: Uuid, status_before: CardStatus, at: DateTime<Utc>) -> ReviewEvent {
        let before = CardSchedulingState {
            status: status_before,
            ..CardSchedulingState::new(at)
        };
        let after = CardSchedulingState {
            status: CardStatus::Learning,
            ..CardSchedulingState::new(at)
        };
        ReviewEvent::new(card_id, Uuid::nil(), Quality::Good, 1000, &before, &after, at)
    }

    fn deck_with_new_and_due() -> Vec<DueCard> {
        let mut cards: Vec<DueCard> = (0..5).map(|_| card(CardStatus::New, 0)).collect();
        cards.extend((0..3).map(|i| card(CardStatus::Review, -i - 1)));
        cards.push(card(CardStatus::Review, 4));
        cards
    }

    #[test]
    fn zero_new_quota_returns_only_due_reviews() {
        let settings = UserSchedulingSettings {
            new_cards_per_day: 0,
            ..Default::default()
        };
        let set = select_due_cards(
            deck_with_new_and_due(),
            &[],
            day_start(),
            &settings,
            &DueOptions::default(),
            now(),
            &mut rng(),
        )
        .unwrap();

        assert_eq!(set.cards.len(), 3);
        assert!(set.cards.iter().all(|c| c.state.status == CardStatus::Review));
        assert!(set.cards.iter().all(|c| c.state.due_at <= now()));
        assert_eq!(set.new_count, 0);
    }

    #[test]
    fn never_returns_suspended_cards() {
        let mut cards = deck_with_new_and_due();
        for c in cards.iter_mut().step_by(2) {
            c.card.suspended = true;
        }
        let suspended: HashSet<Uuid> = cards.iter().filter(|c| c.card.suspended).map(|c| c.card.id).collect();

        let set = select_due_cards(
            cards,
            &[],
            day_start(),
            &UserSchedulingSettings::default(),
            &DueOptions::default(),
            now(),
            &mut rng(),
        )
        .unwrap();

        assert!(!set.is_empty());
        assert!(set.cards.iter().all(|c| !suspended.contains(&c.card.id)));
    }

    #[test]
    fn todays_events_consume_quota() {
        let settings = UserSchedulingSettings {
            new_cards_per_day: 3,
            max_reviews_per_day: 2,
            ..Default::default()
        };
        let seen_new = Uuid::new_v4();
        let events = vec![
            event(seen_new, CardStatus::New, now() - Duration::hours(2)),
            // A second review of the same card the same day is not a new introduction.
            event(seen_new, CardStatus::Learning, now() - Duration::hours(1)),
            // Yesterday's events do not count.
            event(Uuid::new_v4(), CardStatus::New, day_start() - Duration::hours(1)),
            event(Uuid::new_v4(), CardStatus::Review, day_start() - Duration::hours(1)),
        ];

        let set = select_due_cards(
            deck_with_new_and_due(),
            &events,
            day_start(),
            &settings,
            &DueOptions::default(),
            now(),
            &mut rng(),
        )
        .unwrap();

        assert_eq!(set.new_count, 2);
        assert_eq!(set.review_count, 1);
        assert_eq!(set.new_remaining, 0);
        assert_eq!(set.review_remaining, 0);
    }

    #[test]
    fn exhausted_quota_is_an_empty_success() {
        let settings = UserSchedulingSettings {
            new_cards_per_day: 1,
            max_reviews_per_day: 0,
            ..Default::default()
        };
        let events = vec![event(Uuid::new_v4(), CardStatus::New, now())];

        let set = select_due_cards(
            deck_with_new_and_due(),
            &events,
            day_start(),
            &settings,
            &DueOptions::default(),
            now(),
            &mut rng(),
        )
        .unwrap();

        assert!(set.is_empty());
    }

    #[test]
    fn include_flags_filter_by_status() {
        let mut cards = deck_with_new_and_due();
        cards.push(card(CardStatus::Learning, -1));
        let options = DueOptions {
            include_new: false,
            include_review: false,
            ..Default::default()
        };

        let set = select_due_cards(
            cards,
            &[],
            day_start(),
            &UserSchedulingSettings::default(),
            &options,
            now(),
            &mut rng(),
        )
        .unwrap();

        assert_eq!(set.cards.len(), 1);
        assert_eq!(set.cards[0].state.status, CardStatus::Learning);
    }

    #[test]
    fn due_date_order_is_ascending() {
        let options = DueOptions {
            include_new: false,
            order: Some(ReviewOrder::DueDate),
            ..Default::default()
        };
        let set = select_due_cards(
            deck_with_new_and_due(),
            &[],
            day_start(),
            &UserSchedulingSettings::default(),
            &options,
            now(),
            &mut rng(),
        )
        .unwrap();

        let due: Vec<DateTime<Utc>> = set.cards.iter().map(|c| c.state.due_at).collect();
        let mut sorted = due.clone();
        sorted.sort();
        assert_eq!(due, sorted);
    }

    #[test]
    fn new_first_and_review_first_group_by_status() {
        let settings = UserSchedulingSettings::default();
        for (order, leading) in [
            (ReviewOrder::NewFirst, CardStatus::New),
            (ReviewOrder::ReviewFirst, CardStatus::Review),
        ] {
            let options = DueOptions {
                order: Some(order),
                ..Default::default()
            };
            let set = select_due_cards(
                deck_with_new_and_due(),
                &[],
                day_start(),
                &settings,
                &options,
                now(),
                &mut rng(),
            )
            .unwrap();
            assert_eq!(set.cards.len(), 8);
            assert_eq!(set.cards[0].state.status, leading);
        }
    }

    #[test]
    fn random_order_is_reproducible_with_seed() {
        let cards = deck_with_new_and_due();
        let pick = |cards: Vec<DueCard>| {
            select_due_cards(
                cards,
                &[],
                day_start(),
                &UserSchedulingSettings::default(),
                &DueOptions::default(),
                now(),
                &mut rng(),
            )
            .unwrap()
            .cards
            .into_iter()
            .map(|c| c.card.id)
            .collect::<Vec<_>>()
        };
        assert_eq!(pick(cards.clone()), pick(cards));
    }

    #[test]
    fn deck_of_only_suspended_cards_is_empty_deck() {
        let mut cards = deck_with_new_and_due();
        cards.iter_mut().for_each(|c| c.card.suspended = true);

        let result = select_due_cards(
            cards.clone(),
            &[],
            day_start(),
            &UserSchedulingSettings::default(),
            &DueOptions::default(),
            now(),
            &mut rng(),
        );
        assert_eq!(result, Err(CoreError::EmptyDeck));
        assert_eq!(
            select_free_study(cards, ReviewOrder::Random, &mut rng()),
            Err(CoreError::EmptyDeck)
        );
    }

    #[test]
    fn free_study_ignores_due_dates_and_quotas() {
        let mut cards = deck_with_new_and_due();
        cards[0].card.suspended = true;
        let studied = select_free_study(cards, ReviewOrder::DueDate, &mut rng()).unwrap();
        assert_eq!(studied.len(), 8);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = UserSchedulingSettings {
            daily_reset_hour: 30,
            ..Default::default()
        };
        let result = select_due_cards(
            deck_with_new_and_due(),
            &[],
            day_start(),
            &settings,
            &DueOptions::default(),
            now(),
            &mut rng(),
        );
        assert!(matches!(result, Err(CoreError::InvalidSettings(_))));
    }
}
