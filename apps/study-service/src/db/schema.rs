//! SQLite schema definitions.

/// Complete schema for the study database.
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS decks (
    id BLOB PRIMARY KEY,
    owner_id BLOB NOT NULL,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cards (
    id BLOB PRIMARY KEY,
    deck_id BLOB NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
    owner_id BLOB NOT NULL,
    front TEXT NOT NULL,
    back TEXT NOT NULL,
    media TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    suspended INTEGER NOT NULL DEFAULT 0
);

-- Exactly one row per card, removed with it
CREATE TABLE IF NOT EXISTS card_states (
    card_id BLOB PRIMARY KEY REFERENCES cards(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'new',
    ease_factor REAL NOT NULL DEFAULT 2.5,
    interval_days INTEGER NOT NULL DEFAULT 0,
    repetitions INTEGER NOT NULL DEFAULT 0,
    due_at TEXT NOT NULL,
    last_reviewed_at TEXT
);

-- Append-only review log
CREATE TABLE IF NOT EXISTS review_events (
    id BLOB PRIMARY KEY,
    card_id BLOB NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
    user_id BLOB NOT NULL,
    quality INTEGER NOT NULL,
    response_time_ms INTEGER NOT NULL,
    reviewed_at TEXT NOT NULL,
    status_before TEXT NOT NULL,
    status_after TEXT NOT NULL,
    interval_before INTEGER NOT NULL,
    interval_after INTEGER NOT NULL,
    ease_before REAL NOT NULL,
    ease_after REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS user_settings (
    user_id BLOB PRIMARY KEY,
    new_cards_per_day INTEGER NOT NULL DEFAULT 20,
    max_reviews_per_day INTEGER NOT NULL DEFAULT 200,
    review_order TEXT NOT NULL DEFAULT 'random',
    daily_reset_hour INTEGER NOT NULL DEFAULT 0,
    show_remaining_count INTEGER NOT NULL DEFAULT 1,
    show_next_intervals INTEGER NOT NULL DEFAULT 1,
    auto_play_audio INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_cards_deck ON cards(deck_id);
CREATE INDEX IF NOT EXISTS idx_card_states_due ON card_states(due_at);
CREATE INDEX IF NOT EXISTS idx_review_events_user_time ON review_events(user_id, reviewed_at);
CREATE INDEX IF NOT EXISTS idx_review_events_card ON review_events(card_id);
"#;
