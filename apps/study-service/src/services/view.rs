//! Presentation-facing snapshots of a live session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use srs_core::{
    preview_intervals, CardStatus, DueCard, IntervalPreview, ReviewSession, SessionCounters,
    SessionState, SpacedRepetitionAlgorithm, StudyMode, UserSchedulingSettings,
};
use uuid::Uuid;

/// The active card as the learner should see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub card_id: Uuid,
    pub front: String,
    /// Only present once the answer has been revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub status: CardStatus,
    /// Per-grade interval previews, when revealed and enabled in settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previews: Option<Vec<IntervalPreview>>,
}

/// Session handle returned to callers after every operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub deck_id: Uuid,
    pub mode: StudyMode,
    pub state: SessionState,
    pub counters: SessionCounters,
    /// Hidden when the user turned off the remaining count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<usize>,
    pub paused: bool,
    pub auto_play_audio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<CardView>,
}

/// Result of asking for a session over a deck.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SessionStart {
    /// Nothing to study right now; no session was created.
    Empty { deck_id: Uuid },
    Started(SessionView),
}

impl SessionStart {
    pub fn view(&self) -> Option<&SessionView> {
        match self {
            Self::Started(view) => Some(view),
            Self::Empty { .. } => None,
        }
    }
}

impl SessionView {
    pub(crate) fn build(
        session: &ReviewSession,
        settings: &UserSchedulingSettings,
        algorithm: &dyn SpacedRepetitionAlgorithm,
        now: DateTime<Utc>,
    ) -> Self {
        let revealed = session.is_revealed();
        let current = session
            .current()
            .map(|due| card_view(due, revealed, settings, algorithm, now));

        Self {
            session_id: session.id(),
            deck_id: session.deck_id(),
            mode: session.mode(),
            state: session.state().clone(),
            counters: session.counters(),
            remaining: settings.show_remaining_count.then(|| session.remaining()),
            paused: session.is_paused(),
            auto_play_audio: settings.auto_play_audio,
            current,
        }
    }
}

fn card_view(
    due: &DueCard,
    revealed: bool,
    settings: &UserSchedulingSettings,
    algorithm: &dyn SpacedRepetitionAlgorithm,
    now: DateTime<Utc>,
) -> CardView {
    let previews = (revealed && settings.show_next_intervals)
        .then(|| preview_intervals(algorithm, &due.state, now).to_vec());

    CardView {
        card_id: due.card.id,
        front: due.card.front.clone(),
        back: revealed.then(|| due.card.back.clone()),
        media: due.card.media.clone(),
        tags: due.card.tags.clone(),
        status: due.state.status,
        previews,
    }
}
