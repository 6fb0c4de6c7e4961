//! Common test utilities and fixtures for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - TestContext wiring a StudyService to an in-memory SQLite store
//! - FlakyStore, a store wrapper that injects commit failures and stalls
//! - Helper functions for creating test data

pub mod fixtures;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use srs_core::{CardSchedulingState, Deck, DueCard, ReviewEvent, UserSchedulingSettings};
use uuid::Uuid;

use study_service::config::ServiceConfig;
use study_service::db::{CommitOutcome, Result, SqliteStore, StoreError, StudyStore};
use study_service::services::StudyService;

/// Store wrapper that can fail or stall on demand.
pub struct FlakyStore {
    inner: SqliteStore,
    failing_commits: AtomicUsize,
    /// Sleep after a commit has already been written, in milliseconds.
    commit_stall_ms: AtomicU64,
    /// Sleep before every read, in milliseconds.
    query_stall_ms: AtomicU64,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            failing_commits: AtomicUsize::new(0),
            commit_stall_ms: AtomicU64::new(0),
            query_stall_ms: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    /// Fail the next `n` commits without writing anything.
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Write commits, then stall before returning.
    pub fn stall_commits(&self, stall: Duration) {
        self.commit_stall_ms.store(stall.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn stall_queries(&self, stall: Duration) {
        self.query_stall_ms.store(stall.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.failing_commits.store(0, Ordering::SeqCst);
        self.commit_stall_ms.store(0, Ordering::SeqCst);
        self.query_stall_ms.store(0, Ordering::SeqCst);
    }

    async fn query_stall(&self) {
        let ms = self.query_stall_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl StudyStore for FlakyStore {
    async fn fetch_deck(&self, deck_id: Uuid) -> Result<Option<Deck>> {
        self.query_stall().await;
        self.inner.fetch_deck(deck_id).await
    }

    async fn fetch_card(&self, card_id: Uuid) -> Result<Option<DueCard>> {
        self.query_stall().await;
        self.inner.fetch_card(card_id).await
    }

    async fn fetch_cards_in_deck(&self, deck_id: Uuid) -> Result<Vec<DueCard>> {
        self.query_stall().await;
        self.inner.fetch_cards_in_deck(deck_id).await
    }

    async fn fetch_review_events_since(
        &self,
        user_id: Uuid,
        deck_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReviewEvent>> {
        self.query_stall().await;
        self.inner.fetch_review_events_since(user_id, deck_id, since).await
    }

    async fn fetch_card_events(&self, card_id: Uuid) -> Result<Vec<ReviewEvent>> {
        self.query_stall().await;
        self.inner.fetch_card_events(card_id).await
    }

    async fn commit_review(&self, event: &ReviewEvent, new_state: &CardSchedulingState) -> Result<CommitOutcome> {
        let failing = self
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Task("injected commit failure".to_string()));
        }

        let outcome = self.inner.commit_review(event, new_state).await?;

        let stall = self.commit_stall_ms.load(Ordering::SeqCst);
        if stall > 0 {
            tokio::time::sleep(Duration::from_millis(stall)).await;
        }
        Ok(outcome)
    }

    async fn replace_card_state(&self, card_id: Uuid, state: &CardSchedulingState) -> Result<()> {
        self.inner.replace_card_state(card_id, state).await
    }

    async fn fetch_user_scheduling_settings(&self, user_id: Uuid) -> Result<UserSchedulingSettings> {
        self.query_stall().await;
        self.inner.fetch_user_scheduling_settings(user_id).await
    }
}

/// Test context: one deck, one user, a service over a flaky in-memory store.
pub struct TestContext {
    pub store: Arc<FlakyStore>,
    pub service: StudyService<FlakyStore>,
    pub deck_id: Uuid,
    pub user_id: Uuid,
}

impl TestContext {
    /// Create a context with short timeouts suited to tests.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let sqlite = SqliteStore::open_in_memory().expect("Failed to open in-memory store");
        let store = Arc::new(FlakyStore::new(sqlite));
        let service = StudyService::new(store.clone(), config).expect("Failed to build service");

        let user_id = Uuid::new_v4();
        let deck = Deck {
            id: Uuid::new_v4(),
            owner_id: user_id,
            name: "Capitals".to_string(),
        };
        store.inner().insert_deck(&deck).expect("Failed to insert deck");

        Self {
            store,
            service,
            deck_id: deck.id,
            user_id,
        }
    }

    pub fn save_settings(&self, settings: &UserSchedulingSettings) {
        self.store
            .inner()
            .save_user_settings(self.user_id, settings)
            .expect("Failed to save settings");
    }

    /// All events recorded for this user in the last day.
    pub async fn recent_events(&self) -> Vec<ReviewEvent> {
        self.store
            .inner()
            .fetch_review_events_since(self.user_id, None, Utc::now() - chrono::Duration::days(1))
            .await
            .expect("Failed to fetch events")
    }
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        query_timeout: Duration::from_millis(500),
        commit_timeout: Duration::from_millis(100),
        ..ServiceConfig::default()
    }
}
