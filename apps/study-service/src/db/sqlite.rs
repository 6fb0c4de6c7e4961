//! SQLite implementation of the study store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use srs_core::{
    should_replace, Card, CardSchedulingState, CardStatus, Deck, DueCard, Quality, ReviewEvent,
    ReviewOrder, UserSchedulingSettings,
};
use uuid::Uuid;

use super::{CommitOutcome, Result, StoreError, StudyStore};

const CARD_COLUMNS: &str = "c.id, c.deck_id, c.owner_id, c.front, c.back, c.media, c.tags, c.created_at, c.suspended,
    cs.status, cs.ease_factor, cs.interval_days, cs.repetitions, cs.due_at, cs.last_reviewed_at";

const EVENT_COLUMNS: &str = "e.id, e.card_id, e.user_id, e.quality, e.response_time_ms, e.reviewed_at,
    e.status_before, e.status_after, e.interval_before, e.interval_after, e.ease_before, e.ease_after";

/// SQLite-backed store. Blocking calls run on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open database at path, creating if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::initialize(Connection::open(path)?)
    }

    /// Open in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute_batch(super::schema::SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Insert a deck.
    pub fn insert_deck(&self, deck: &Deck) -> Result<()> {
        self.lock()?.execute(
            "INSERT INTO decks (id, owner_id, name) VALUES (?1, ?2, ?3)",
            params![deck.id, deck.owner_id, deck.name],
        )?;
        Ok(())
    }

    /// Insert a card together with its default scheduling state.
    pub fn insert_card(&self, card: &Card) -> Result<CardSchedulingState> {
        let state = CardSchedulingState::new(card.created_at);
        let media = to_json(&card.media)?;
        let tags = to_json(&card.tags)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO cards (id, deck_id, owner_id, front, back, media, tags, created_at, suspended)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                card.id,
                card.deck_id,
                card.owner_id,
                card.front,
                card.back,
                media,
                tags,
                card.created_at,
                card.suspended,
            ],
        )?;
        write_state(&tx, card.id, &state)?;
        tx.commit()?;
        Ok(state)
    }

    /// Suspend or unsuspend a card.
    pub fn set_suspended(&self, card_id: Uuid, suspended: bool) -> Result<()> {
        let changed = self.lock()?.execute(
            "UPDATE cards SET suspended = ?1 WHERE id = ?2",
            params![suspended, card_id],
        )?;
        if changed == 0 {
            return Err(StoreError::CardNotFound(card_id));
        }
        Ok(())
    }

    /// Delete a card. Its state and events go with it.
    pub fn delete_card(&self, card_id: Uuid) -> Result<()> {
        self.lock()?
            .execute("DELETE FROM cards WHERE id = ?1", params![card_id])?;
        Ok(())
    }

    /// Save a user's scheduling settings.
    pub fn save_user_settings(&self, user_id: Uuid, settings: &UserSchedulingSettings) -> Result<()> {
        self.lock()?.execute(
            "INSERT OR REPLACE INTO user_settings (user_id, new_cards_per_day, max_reviews_per_day, review_order,
                daily_reset_hour, show_remaining_count, show_next_intervals, auto_play_audio)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                settings.new_cards_per_day,
                settings.max_reviews_per_day,
                settings.review_order.as_str(),
                settings.daily_reset_hour,
                settings.show_remaining_count,
                settings.show_next_intervals,
                settings.auto_play_audio,
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl StudyStore for SqliteStore {
    async fn fetch_deck(&self, deck_id: Uuid) -> Result<Option<Deck>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, owner_id, name FROM decks WHERE id = ?1",
                params![deck_id],
                |row| {
                    Ok(Deck {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
        })
        .await
    }

    async fn fetch_card(&self, card_id: Uuid) -> Result<Option<DueCard>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {CARD_COLUMNS} FROM cards c JOIN card_states cs ON c.id = cs.card_id WHERE c.id = ?1"
            );
            conn.query_row(&sql, params![card_id], row_to_due_card)
                .optional()
                .map_err(Into::into)
        })
        .await
    }

    async fn fetch_cards_in_deck(&self, deck_id: Uuid) -> Result<Vec<DueCard>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {CARD_COLUMNS} FROM cards c JOIN card_states cs ON c.id = cs.card_id
                 WHERE c.deck_id = ?1 ORDER BY c.created_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let cards = stmt
                .query_map(params![deck_id], row_to_due_card)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(cards)
        })
        .await
    }

    async fn fetch_review_events_since(
        &self,
        user_id: Uuid,
        deck_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReviewEvent>> {
        self.with_conn(move |conn| {
            let events = match deck_id {
                Some(deck_id) => {
                    let sql = format!(
                        "SELECT {EVENT_COLUMNS} FROM review_events e JOIN cards c ON c.id = e.card_id
                         WHERE e.user_id = ?1 AND c.deck_id = ?2 AND e.reviewed_at >= ?3
                         ORDER BY e.reviewed_at, e.id"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![user_id, deck_id, since], row_to_event)?;
                    rows.collect::<std::result::Result<Vec<_>, _>>()?
                }
                None => {
                    let sql = format!(
                        "SELECT {EVENT_COLUMNS} FROM review_events e
                         WHERE e.user_id = ?1 AND e.reviewed_at >= ?2
                         ORDER BY e.reviewed_at, e.id"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![user_id, since], row_to_event)?;
                    rows.collect::<std::result::Result<Vec<_>, _>>()?
                }
            };
            Ok(events)
        })
        .await
    }

    async fn fetch_card_events(&self, card_id: Uuid) -> Result<Vec<ReviewEvent>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM review_events e WHERE e.card_id = ?1 ORDER BY e.reviewed_at, e.id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let events = stmt
                .query_map(params![card_id], row_to_event)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(events)
        })
        .await
    }

    async fn commit_review(
        &self,
        event: &ReviewEvent,
        new_state: &CardSchedulingState,
    ) -> Result<CommitOutcome> {
        let event = event.clone();
        let new_state = new_state.clone();
        self.with_conn(move |conn| commit(conn, &event, &new_state)).await
    }

    async fn replace_card_state(&self, card_id: Uuid, state: &CardSchedulingState) -> Result<()> {
        let state = state.clone();
        self.with_conn(move |conn| {
            if read_state(conn, card_id)?.is_none() {
                return Err(StoreError::CardNotFound(card_id));
            }
            write_state(conn, card_id, &state)
        })
        .await
    }

    async fn fetch_user_scheduling_settings(&self, user_id: Uuid) -> Result<UserSchedulingSettings> {
        self.with_conn(move |conn| {
            let stored = conn
                .query_row(
                    "SELECT new_cards_per_day, max_reviews_per_day, review_order, daily_reset_hour,
                        show_remaining_count, show_next_intervals, auto_play_audio
                     FROM user_settings WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        let order: String = row.get(2)?;
                        Ok(UserSchedulingSettings {
                            new_cards_per_day: row.get(0)?,
                            max_reviews_per_day: row.get(1)?,
                            review_order: ReviewOrder::from_str(&order).unwrap_or_default(),
                            daily_reset_hour: row.get(3)?,
                            show_remaining_count: row.get(4)?,
                            show_next_intervals: row.get(5)?,
                            auto_play_audio: row.get(6)?,
                        })
                    },
                )
                .optional()?;
            Ok(stored.unwrap_or_default())
        })
        .await
    }
}

fn commit(
    conn: &mut Connection,
    event: &ReviewEvent,
    new_state: &CardSchedulingState,
) -> Result<CommitOutcome> {
    let tx = conn.transaction()?;

    let seen: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM review_events WHERE id = ?1)",
        params![event.id],
        |row| row.get(0),
    )?;
    if seen {
        return Ok(CommitOutcome::Duplicate);
    }

    let current = read_state(&tx, event.card_id)?.ok_or(StoreError::CardNotFound(event.card_id))?;

    tx.execute(
        "INSERT INTO review_events (id, card_id, user_id, quality, response_time_ms, reviewed_at,
            status_before, status_after, interval_before, interval_after, ease_before, ease_after)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            event.id,
            event.card_id,
            event.user_id,
            event.quality.to_value(),
            event.response_time_ms as i64,
            event.reviewed_at,
            event.status_before.as_str(),
            event.status_after.as_str(),
            event.interval_before,
            event.interval_after,
            event.ease_before,
            event.ease_after,
        ],
    )?;

    let outcome = match current.last_reviewed_at {
        Some(current_reviewed_at) if !should_replace(&current, new_state) => {
            CommitOutcome::Superseded { current_reviewed_at }
        }
        _ => {
            write_state(&tx, event.card_id, new_state)?;
            CommitOutcome::Applied
        }
    };

    tx.commit()?;
    Ok(outcome)
}

fn read_state(conn: &Connection, card_id: Uuid) -> Result<Option<CardSchedulingState>> {
    conn.query_row(
        "SELECT status, ease_factor, interval_days, repetitions, due_at, last_reviewed_at
         FROM card_states WHERE card_id = ?1",
        params![card_id],
        |row| {
            Ok(CardSchedulingState {
                status: status_column(row, 0)?,
                ease_factor: row.get(1)?,
                interval_days: row.get(2)?,
                repetitions: row.get(3)?,
                due_at: row.get(4)?,
                last_reviewed_at: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

fn write_state(conn: &Connection, card_id: Uuid, state: &CardSchedulingState) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO card_states (card_id, status, ease_factor, interval_days, repetitions, due_at, last_reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            card_id,
            state.status.as_str(),
            state.ease_factor,
            state.interval_days,
            state.repetitions,
            state.due_at,
            state.last_reviewed_at,
        ],
    )?;
    Ok(())
}

fn row_to_due_card(row: &Row) -> rusqlite::Result<DueCard> {
    Ok(DueCard {
        card: Card {
            id: row.get(0)?,
            deck_id: row.get(1)?,
            owner_id: row.get(2)?,
            front: row.get(3)?,
            back: row.get(4)?,
            media: json_column(row, 5)?,
            tags: json_column(row, 6)?,
            created_at: row.get(7)?,
            suspended: row.get(8)?,
        },
        state: CardSchedulingState {
            status: status_column(row, 9)?,
            ease_factor: row.get(10)?,
            interval_days: row.get(11)?,
            repetitions: row.get(12)?,
            due_at: row.get(13)?,
            last_reviewed_at: row.get(14)?,
        },
    })
}

fn row_to_event(row: &Row) -> rusqlite::Result<ReviewEvent> {
    let quality: u8 = row.get(3)?;
    let response_time_ms: i64 = row.get(4)?;
    Ok(ReviewEvent {
        id: row.get(0)?,
        card_id: row.get(1)?,
        user_id: row.get(2)?,
        quality: Quality::try_from(quality)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, Box::new(e)))?,
        response_time_ms: response_time_ms.max(0) as u64,
        reviewed_at: row.get(5)?,
        status_before: status_column(row, 6)?,
        status_after: status_column(row, 7)?,
        interval_before: row.get(8)?,
        interval_after: row.get(9)?,
        ease_before: row.get(10)?,
        ease_after: row.get(11)?,
    })
}

fn status_column(row: &Row, idx: usize) -> rusqlite::Result<CardStatus> {
    let raw: String = row.get(idx)?;
    CardStatus::from_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("unknown status {raw:?}").into())
    })
}

fn json_column(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json(values: &[String]) -> Result<String> {
    serde_json::to_string(values).map_err(|e| StoreError::InvalidData(e.to_string()))
}
