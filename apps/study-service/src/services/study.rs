//! Study service: due sets, live sessions and review commits.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use srs_core::date_utils::study_day_start;
use srs_core::{
    get_algorithm, select_due_cards, select_free_study, Advance, Deck, DueCard, DueOptions, DueSet,
    PreparedReview, Quality, ReviewEvent, ReviewSession, SessionSummary, SpacedRepetitionAlgorithm,
    StudyMode, UserSchedulingSettings,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::db::{CommitOutcome, StudyStore};
use crate::error::{Result, StudyError, StudyWarning};
use crate::services::view::{SessionStart, SessionView};

/// A session together with what it needs between calls.
struct LiveSession {
    session: ReviewSession,
    settings: UserSchedulingSettings,
    /// Review whose commit failed or timed out. Reused on retry so a write
    /// that landed late is recognised as a duplicate instead of applied twice,
    /// even when the retry carries a different grade.
    pending: Option<PreparedReview>,
}

/// Result of an accepted grade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitOutcome {
    pub event: ReviewEvent,
    pub advance: Advance,
    /// Updated session, absent once the session is complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<SessionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<StudyWarning>,
}

/// Everything needed to select cards from one deck for one user.
pub(crate) struct DeckInputs {
    pub cards: Vec<DueCard>,
    pub settings: UserSchedulingSettings,
    pub today_events: Vec<ReviewEvent>,
    pub day_start: DateTime<Utc>,
}

/// Orchestrates the scheduling core against a [`StudyStore`].
pub struct StudyService<S: StudyStore> {
    pub(crate) store: Arc<S>,
    pub(crate) algorithm: Box<dyn SpacedRepetitionAlgorithm>,
    pub(crate) config: ServiceConfig,
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<LiveSession>>>>,
}

impl<S: StudyStore> StudyService<S> {
    /// Build a service using the algorithm named in `config`.
    pub fn new(store: Arc<S>, config: ServiceConfig) -> Result<Self> {
        let algorithm = get_algorithm(&config.algorithm)
            .ok_or_else(|| StudyError::Validation(format!("Unknown algorithm: {}", config.algorithm)))?;
        Ok(Self::with_algorithm(store, algorithm, config))
    }

    pub fn with_algorithm(
        store: Arc<S>,
        algorithm: Box<dyn SpacedRepetitionAlgorithm>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            algorithm,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn algorithm(&self) -> &dyn SpacedRepetitionAlgorithm {
        self.algorithm.as_ref()
    }

    /// Ordered cards eligible for review now, within today's quotas.
    pub async fn get_due_cards(&self, deck_id: Uuid, user_id: Uuid, options: &DueOptions) -> Result<DueSet> {
        let now = Utc::now();
        let inputs = self.load_deck_inputs(deck_id, user_id, now).await?;
        let due = self.select_due(deck_id, inputs, options, now)?;

        tracing::debug!(
            %deck_id,
            %user_id,
            new = due.new_count,
            review = due.review_count,
            new_remaining = due.new_remaining,
            review_remaining = due.review_remaining,
            "Selected due set"
        );
        Ok(due)
    }

    /// Every unsuspended card in the deck, ignoring due dates and quotas.
    pub async fn get_free_study_cards(&self, deck_id: Uuid, user_id: Uuid) -> Result<Vec<DueCard>> {
        let inputs = self.load_deck_inputs(deck_id, user_id, Utc::now()).await?;
        let order = inputs.settings.review_order;
        select_free_study(inputs.cards, order, &mut rand::thread_rng())
            .map_err(|e| StudyError::from_core(e, deck_id))
    }

    /// Start a session over today's due set.
    ///
    /// An empty due set yields [`SessionStart::Empty`]; a deck with no
    /// studyable cards at all is [`StudyError::EmptyDeck`].
    pub async fn start_session(&self, deck_id: Uuid, user_id: Uuid) -> Result<SessionStart> {
        let now = Utc::now();
        let inputs = self.load_deck_inputs(deck_id, user_id, now).await?;
        let settings = inputs.settings.clone();
        let due = self.select_due(deck_id, inputs, &DueOptions::default(), now)?;
        self.open_session(deck_id, user_id, StudyMode::Scheduled, due.cards, settings, now)
            .await
    }

    /// Start a session over every unsuspended card in the deck.
    pub async fn start_free_study(&self, deck_id: Uuid, user_id: Uuid) -> Result<SessionStart> {
        let now = Utc::now();
        let inputs = self.load_deck_inputs(deck_id, user_id, now).await?;
        let settings = inputs.settings;
        let cards = select_free_study(inputs.cards, settings.review_order, &mut rand::thread_rng())
            .map_err(|e| StudyError::from_core(e, deck_id))?;
        self.open_session(deck_id, user_id, StudyMode::FreeStudy, cards, settings, now)
            .await
    }

    pub async fn session_view(&self, session_id: Uuid) -> Result<SessionView> {
        let live = self.live(session_id).await?;
        let live = live.lock().await;
        Ok(self.view(&live, Utc::now()))
    }

    /// Show the back of the active card.
    pub async fn reveal(&self, session_id: Uuid) -> Result<SessionView> {
        let live = self.live(session_id).await?;
        let mut live = live.lock().await;
        live.session.reveal()?;
        Ok(self.view(&live, Utc::now()))
    }

    pub async fn pause(&self, session_id: Uuid) -> Result<SessionView> {
        let live = self.live(session_id).await?;
        let mut live = live.lock().await;
        let now = Utc::now();
        live.session.pause(now)?;
        Ok(self.view(&live, now))
    }

    pub async fn resume(&self, session_id: Uuid) -> Result<SessionView> {
        let live = self.live(session_id).await?;
        let mut live = live.lock().await;
        let now = Utc::now();
        live.session.resume(now)?;
        Ok(self.view(&live, now))
    }

    /// Grade the active card, commit the review, then advance.
    ///
    /// On any error the session stays on the same card with unchanged
    /// counters.
    pub async fn submit_quality(&self, session_id: Uuid, card_id: Uuid, quality: i64) -> Result<SubmitOutcome> {
        let quality = Quality::from_value(quality)?;
        let live = self.live(session_id).await?;
        let mut live = live.lock().await;
        let now = Utc::now();

        let fresh = live
            .session
            .prepare_submission(card_id, quality, self.algorithm.as_ref(), now)?;
        let prepared = match live.pending.take() {
            None => fresh,
            Some(pending) if pending.event.quality == quality => {
                tracing::debug!(%session_id, event_id = %pending.event.id, "Retrying pending review");
                pending
            }
            // A different grade may only replace the pending review if that one never landed.
            Some(pending) => match self.pending_landed(&pending).await {
                Ok(true) => {
                    tracing::info!(
                        %session_id,
                        event_id = %pending.event.id,
                        kept = ?pending.event.quality,
                        ignored = ?quality,
                        "Earlier grade was already committed; keeping it"
                    );
                    pending
                }
                Ok(false) => fresh,
                Err(err) => {
                    live.pending = Some(pending);
                    return Err(err);
                }
            },
        };

        let limit = self.config.commit_timeout;
        let committed = tokio::time::timeout(
            limit,
            self.store.commit_review(&prepared.event, &prepared.new_state),
        )
        .await;

        let outcome = match committed {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                tracing::warn!(%session_id, %card_id, error = %err, "Review commit failed");
                live.pending = Some(prepared);
                return Err(err.into());
            }
            Err(_) => {
                tracing::warn!(%session_id, %card_id, timeout_ms = limit.as_millis() as u64, "Review commit timed out");
                live.pending = Some(prepared);
                return Err(timeout_error("review commit", limit));
            }
        };

        let warning = match outcome {
            CommitOutcome::Applied => None,
            CommitOutcome::Duplicate => {
                tracing::debug!(%session_id, event_id = %prepared.event.id, "Review was already committed");
                None
            }
            CommitOutcome::Superseded { current_reviewed_at } => {
                tracing::warn!(
                    %card_id,
                    %current_reviewed_at,
                    "Newer review already owns card state; recorded event only"
                );
                Some(StudyWarning::ConcurrencyConflict {
                    card_id,
                    current_reviewed_at,
                })
            }
        };

        let event = prepared.event.clone();
        let advance = live.session.complete_submission(prepared, now)?;

        let view = match &advance {
            Advance::Complete { summary } => {
                tracing::info!(
                    %session_id,
                    reviewed = summary.reviewed,
                    correct = summary.correct,
                    duration_ms = summary.duration_ms,
                    "Session complete"
                );
                self.sessions.lock().await.remove(&session_id);
                None
            }
            Advance::Next { .. } => Some(self.view(&live, now)),
        };

        Ok(SubmitOutcome {
            event,
            advance,
            view,
            warning,
        })
    }

    /// Drop a session without finishing it. Committed reviews stay.
    pub async fn abandon_session(&self, session_id: Uuid) -> Result<SessionSummary> {
        let live = self
            .sessions
            .lock()
            .await
            .remove(&session_id)
            .ok_or_else(|| StudyError::NotFound(format!("Session {session_id}")))?;
        let live = live.lock().await;
        let summary = live.session.summary(Utc::now());
        tracing::info!(%session_id, reviewed = summary.reviewed, "Session abandoned");
        Ok(summary)
    }

    /// Number of sessions currently held in memory.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Run `fut` under `limit`, mapping expiry to a retryable timeout.
    pub(crate) async fn bounded<T, F>(&self, operation: &'static str, limit: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "Query timed out");
                Err(timeout_error(operation, limit))
            }
        }
    }

    /// Whether a review whose commit was not confirmed is in the log anyway.
    async fn pending_landed(&self, pending: &PreparedReview) -> Result<bool> {
        let card_id = pending.event.card_id;
        let events = self
            .bounded("pending review lookup", self.config.query_timeout, async {
                Ok::<_, StudyError>(self.store.fetch_card_events(card_id).await?)
            })
            .await?;
        Ok(events.iter().any(|event| event.id == pending.event.id))
    }

    pub(crate) async fn load_deck_inputs(
        &self,
        deck_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<DeckInputs> {
        self.bounded(
            "due-set query",
            self.config.query_timeout,
            self.fetch_deck_inputs(deck_id, user_id, now),
        )
        .await
    }

    async fn fetch_deck_inputs(&self, deck_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<DeckInputs> {
        self.require_deck(deck_id).await?;

        let settings = self.store.fetch_user_scheduling_settings(user_id).await?;
        settings.validate()?;

        let day_start = study_day_start(now, settings.daily_reset_hour);
        let cards = self.store.fetch_cards_in_deck(deck_id).await?;
        let today_events = self
            .store
            .fetch_review_events_since(user_id, Some(deck_id), day_start)
            .await?;

        Ok(DeckInputs {
            cards,
            settings,
            today_events,
            day_start,
        })
    }

    pub(crate) async fn require_deck(&self, deck_id: Uuid) -> Result<Deck> {
        self.store
            .fetch_deck(deck_id)
            .await?
            .ok_or_else(|| StudyError::NotFound(format!("Deck {deck_id}")))
    }

    fn select_due(
        &self,
        deck_id: Uuid,
        inputs: DeckInputs,
        options: &DueOptions,
        now: DateTime<Utc>,
    ) -> Result<DueSet> {
        select_due_cards(
            inputs.cards,
            &inputs.today_events,
            inputs.day_start,
            &inputs.settings,
            options,
            now,
            &mut rand::thread_rng(),
        )
        .map_err(|e| StudyError::from_core(e, deck_id))
    }

    async fn open_session(
        &self,
        deck_id: Uuid,
        user_id: Uuid,
        mode: StudyMode,
        queue: Vec<DueCard>,
        settings: UserSchedulingSettings,
        now: DateTime<Utc>,
    ) -> Result<SessionStart> {
        let Some(session) = ReviewSession::start(user_id, deck_id, mode, queue, now) else {
            tracing::info!(%deck_id, %user_id, ?mode, "Nothing to study");
            return Ok(SessionStart::Empty { deck_id });
        };

        let session_id = session.id();
        let live = LiveSession {
            session,
            settings,
            pending: None,
        };
        let view = self.view(&live, now);
        tracing::info!(%session_id, %deck_id, %user_id, ?mode, cards = view.counters.total, "Session started");

        self.sessions
            .lock()
            .await
            .insert(session_id, Arc::new(Mutex::new(live)));
        Ok(SessionStart::Started(view))
    }

    async fn live(&self, session_id: Uuid) -> Result<Arc<Mutex<LiveSession>>> {
        self.sessions
            .lock()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| StudyError::NotFound(format!("Session {session_id}")))
    }

    fn view(&self, live: &LiveSession, now: DateTime<Utc>) -> SessionView {
        SessionView::build(&live.session, &live.settings, self.algorithm.as_ref(), now)
    }
}

fn timeout_error(operation: &'static str, limit: Duration) -> StudyError {
    StudyError::Timeout {
        operation,
        timeout_ms: limit.as_millis() as u64,
    }
}
