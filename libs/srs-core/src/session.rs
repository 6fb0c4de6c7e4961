//! Review session state machine.
//!
//! A session walks a fixed queue of cards one at a time:
//!
//! ```text
//! Presenting -> Revealed -> Presenting(next) | Complete
//!      \____________/
//!        Paused (from and back to either)
//! ```
//!
//! Submitting a grade is split in two so the caller can persist the review
//! between the steps: [`ReviewSession::prepare_submission`] computes the
//! event and next state without touching the session, and
//! [`ReviewSession::complete_submission`] advances only once the commit
//! succeeded. A failed commit leaves the session exactly where it was.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::algorithm::SpacedRepetitionAlgorithm;
use crate::error::{CoreError, Result};
use crate::types::{Card, CardSchedulingState, DueCard, Quality, ReviewEvent};

/// Where a session's queue came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    Scheduled,
    FreeStudy,
}

/// Sub-state of an active card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardPhase {
    Presenting,
    Revealed,
}

/// Current state of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Active { phase: CardPhase },
    Paused { resume_to: CardPhase, since: DateTime<Utc> },
    Complete { summary: SessionSummary },
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounters {
    pub total: usize,
    pub reviewed: usize,
    pub correct: usize,
}

/// Terminal result of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Time spent studying, excluding pauses.
    pub duration_ms: u64,
    pub reviewed: usize,
    pub correct: usize,
    /// correct / reviewed, 0 when nothing was reviewed.
    pub retention: f64,
}

/// A review computed but not yet applied to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedReview {
    pub event: ReviewEvent,
    pub new_state: CardSchedulingState,
    cursor: usize,
}

/// What happened after a submission was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Advance {
    Next { card_id: Uuid },
    Complete { summary: SessionSummary },
}

/// Ephemeral state of one study session. Never persisted.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    id: Uuid,
    user_id: Uuid,
    deck_id: Uuid,
    mode: StudyMode,
    queue: Vec<DueCard>,
    cursor: usize,
    state: SessionState,
    counters: SessionCounters,
    started_at: DateTime<Utc>,
    presented_at: DateTime<Utc>,
    paused_on_card: Duration,
    paused_total: Duration,
}

impl ReviewSession {
    /// Start a session over `queue`. Returns `None` for an empty queue: an
    /// empty fetch ends the session before any state is entered.
    pub fn start(
        user_id: Uuid,
        deck_id: Uuid,
        mode: StudyMode,
        queue: Vec<DueCard>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if queue.is_empty() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            user_id,
            deck_id,
            mode,
            counters: SessionCounters {
                total: queue.len(),
                ..Default::default()
            },
            queue,
            cursor: 0,
            state: SessionState::Active {
                phase: CardPhase::Presenting,
            },
            started_at: now,
            presented_at: now,
            paused_on_card: Duration::zero(),
            paused_total: Duration::zero(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn deck_id(&self) -> Uuid {
        self.deck_id
    }

    pub fn mode(&self) -> StudyMode {
        self.mode
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, SessionState::Complete { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, SessionState::Paused { .. })
    }

    /// Cards not yet graded, including the active one.
    pub fn remaining(&self) -> usize {
        self.queue.len() - self.cursor
    }

    /// The active card, if the session is not complete.
    pub fn current(&self) -> Option<&DueCard> {
        if self.is_complete() {
            return None;
        }
        self.queue.get(self.cursor)
    }

    /// Whether the back of the active card is showing.
    pub fn is_revealed(&self) -> bool {
        matches!(
            self.state,
            SessionState::Active {
                phase: CardPhase::Revealed
            } | SessionState::Paused {
                resume_to: CardPhase::Revealed,
                ..
            }
        )
    }

    /// Show the back of the active card. Revealing twice is a no-op.
    pub fn reveal(&mut self) -> Result<&Card> {
        match self.state {
            SessionState::Complete { .. } => return Err(CoreError::SessionComplete),
            SessionState::Paused { .. } => return Err(CoreError::SessionPaused),
            SessionState::Active { .. } => {
                self.state = SessionState::Active {
                    phase: CardPhase::Revealed,
                };
            }
        }
        Ok(&self.queue[self.cursor].card)
    }

    /// Compute the review for grading the active card, without changing the session.
    pub fn prepare_submission(
        &self,
        card_id: Uuid,
        quality: Quality,
        algorithm: &dyn SpacedRepetitionAlgorithm,
        now: DateTime<Utc>,
    ) -> Result<PreparedReview> {
        match self.state {
            SessionState::Complete { .. } => return Err(CoreError::SessionComplete),
            SessionState::Paused { .. } => return Err(CoreError::SessionPaused),
            SessionState::Active {
                phase: CardPhase::Presenting,
            } => return Err(CoreError::NotRevealed),
            SessionState::Active {
                phase: CardPhase::Revealed,
            } => {}
        }

        let active = &self.queue[self.cursor];
        if active.card.id != card_id {
            return Err(CoreError::InactiveCard {
                expected: active.card.id,
                got: card_id,
            });
        }

        let new_state = algorithm.apply(&active.state, quality, now);
        let event = ReviewEvent::new(
            card_id,
            self.user_id,
            quality,
            self.response_time_ms(now),
            &active.state,
            &new_state,
            now,
        );

        Ok(PreparedReview {
            event,
            new_state,
            cursor: self.cursor,
        })
    }

    /// Apply a committed review and advance the queue.
    pub fn complete_submission(&mut self, prepared: PreparedReview, now: DateTime<Utc>) -> Result<Advance> {
        let still_active = matches!(
            self.state,
            SessionState::Active {
                phase: CardPhase::Revealed
            }
        );
        if !still_active
            || prepared.cursor != self.cursor
            || self.queue[self.cursor].card.id != prepared.event.card_id
        {
            return Err(CoreError::StaleSubmission);
        }

        self.counters.reviewed += 1;
        if prepared.event.quality.is_pass() {
            self.counters.correct += 1;
        }
        self.queue[self.cursor].state = prepared.new_state;
        self.cursor += 1;

        if self.cursor >= self.queue.len() {
            let summary = self.summary(now);
            self.state = SessionState::Complete {
                summary: summary.clone(),
            };
            return Ok(Advance::Complete { summary });
        }

        self.state = SessionState::Active {
            phase: CardPhase::Presenting,
        };
        self.presented_at = now;
        self.paused_on_card = Duration::zero();
        Ok(Advance::Next {
            card_id: self.queue[self.cursor].card.id,
        })
    }

    /// Pause the session. Pausing twice is a no-op.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.state {
            SessionState::Complete { .. } => Err(CoreError::SessionComplete),
            SessionState::Paused { .. } => Ok(()),
            SessionState::Active { phase } => {
                self.state = SessionState::Paused {
                    resume_to: phase,
                    since: now,
                };
                Ok(())
            }
        }
    }

    /// Resume a paused session. Resuming an active session is a no-op.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.state {
            SessionState::Complete { .. } => Err(CoreError::SessionComplete),
            SessionState::Active { .. } => Ok(()),
            SessionState::Paused { resume_to, since } => {
                let paused = (now - since).max(Duration::zero());
                self.paused_on_card = self.paused_on_card + paused;
                self.paused_total = self.paused_total + paused;
                self.state = SessionState::Active { phase: resume_to };
                Ok(())
            }
        }
    }

    /// Summary so far; final once the session is complete.
    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        if let SessionState::Complete { summary } = &self.state {
            return summary.clone();
        }
        let pausing = match self.state {
            SessionState::Paused { since, .. } => (now - since).max(Duration::zero()),
            _ => Duration::zero(),
        };
        let studied = (now - self.started_at - self.paused_total - pausing).max(Duration::zero());
        SessionSummary {
            duration_ms: studied.num_milliseconds() as u64,
            reviewed: self.counters.reviewed,
            correct: self.counters.correct,
            retention: retention(self.counters.correct, self.counters.reviewed),
        }
    }

    fn response_time_ms(&self, now: DateTime<Utc>) -> u64 {
        let elapsed = now - self.presented_at - self.paused_on_card;
        elapsed.num_milliseconds().max(0) as u64
    }
}

fn retention(correct: usize, reviewed: usize) -> f64 {
    if reviewed == 0 {
        0.0
    } else {
        correct as f64 / reviewed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Sm2;
    use crate::types::CardStatus;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 18, 0, 0).unwrap()
    }

    fn secs(n: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(n)
    }

    fn queue(n: usize) -> Vec<DueCard> {
        (0..n)
            .map(|i| {
                let created = t0() - Duration::days(1);
                DueCard {
                    card: Card::new(Uuid::nil(), Uuid::nil(), format!("q{i}"), format!("a{i}"), created),
                    state: CardSchedulingState::new(created),
                }
            })
            .collect()
    }

    fn session(n: usize) -> ReviewSession {
        ReviewSession::start(Uuid::new_v4(), Uuid::new_v4(), StudyMode::Scheduled, queue(n), t0())
            .expect("non-empty queue")
    }

    fn grade(session: &mut ReviewSession, quality: Quality, at: DateTime<Utc>) -> Advance {
        session.reveal().unwrap();
        let card_id = session.current().unwrap().card.id;
        let prepared = session
            .prepare_submission(card_id, quality, &Sm2::default(), at)
            .unwrap();
        session.complete_submission(prepared, at).unwrap()
    }

    #[test]
    fn empty_queue_does_not_start() {
        assert!(ReviewSession::start(Uuid::nil(), Uuid::nil(), StudyMode::Scheduled, vec![], t0()).is_none());
    }

    #[test]
    fn submission_requires_reveal() {
        let s = session(2);
        let card_id = s.current().unwrap().card.id;
        let result = s.prepare_submission(card_id, Quality::Good, &Sm2::default(), t0());
        assert_eq!(result.unwrap_err(), CoreError::NotRevealed);
    }

    #[test]
    fn walks_queue_to_completion() {
        let mut s = session(3);
        assert!(matches!(grade(&mut s, Quality::Good, secs(10)), Advance::Next { .. }));
        assert!(matches!(grade(&mut s, Quality::Again, secs(20)), Advance::Next { .. }));
        let last = grade(&mut s, Quality::VeryEasy, secs(30));

        let summary = match last {
            Advance::Complete { summary } => summary,
            other => panic!("expected completion, got {other:?}"),
        };
        assert_eq!(summary.reviewed, 3);
        assert_eq!(summary.correct, 2);
        assert!((summary.retention - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.duration_ms, 30_000);
        assert!(s.is_complete());
        assert!(s.current().is_none());
        assert_eq!(s.reveal().unwrap_err(), CoreError::SessionComplete);
    }

    #[test]
    fn submission_for_other_card_is_rejected() {
        let mut s = session(2);
        s.reveal().unwrap();
        let stranger = Uuid::new_v4();
        let err = s
            .prepare_submission(stranger, Quality::Good, &Sm2::default(), secs(5))
            .unwrap_err();
        assert!(matches!(err, CoreError::InactiveCard { got, .. } if got == stranger));
        assert_eq!(s.counters().reviewed, 0);
    }

    #[test]
    fn prepared_review_for_advanced_card_is_stale() {
        let mut s = session(2);
        s.reveal().unwrap();
        let card_id = s.current().unwrap().card.id;
        let first = s.prepare_submission(card_id, Quality::Good, &Sm2::default(), secs(1)).unwrap();
        let duplicate = first.clone();

        s.complete_submission(first, secs(1)).unwrap();
        s.reveal().unwrap();

        assert_eq!(
            s.complete_submission(duplicate, secs(2)).unwrap_err(),
            CoreError::StaleSubmission
        );
        assert_eq!(s.counters().reviewed, 1);
    }

    #[test]
    fn uncommitted_preparation_leaves_session_untouched() {
        let mut s = session(2);
        s.reveal().unwrap();
        let card_id = s.current().unwrap().card.id;
        let _dropped = s.prepare_submission(card_id, Quality::Good, &Sm2::default(), secs(3)).unwrap();

        assert_eq!(s.current().unwrap().card.id, card_id);
        assert_eq!(s.counters(), SessionCounters { total: 2, reviewed: 0, correct: 0 });
        assert!(s.is_revealed());
    }

    #[test]
    fn pause_blocks_reveal_and_submission() {
        let mut s = session(1);
        s.pause(secs(1)).unwrap();
        assert_eq!(s.reveal().unwrap_err(), CoreError::SessionPaused);
        let card_id = s.current().unwrap().card.id;
        assert_eq!(
            s.prepare_submission(card_id, Quality::Good, &Sm2::default(), secs(2))
                .unwrap_err(),
            CoreError::SessionPaused
        );
    }

    #[test]
    fn paused_time_is_excluded_from_response_time() {
        let mut s = session(2);
        s.reveal().unwrap();
        s.pause(secs(4)).unwrap();
        s.resume(secs(64)).unwrap();
        assert!(s.is_revealed());

        let card_id = s.current().unwrap().card.id;
        let prepared = s
            .prepare_submission(card_id, Quality::Good, &Sm2::default(), secs(70))
            .unwrap();
        assert_eq!(prepared.event.response_time_ms, 10_000);

        s.complete_submission(prepared, secs(70)).unwrap();
        s.reveal().unwrap();
        let next_id = s.current().unwrap().card.id;
        let next = s
            .prepare_submission(next_id, Quality::Good, &Sm2::default(), secs(75))
            .unwrap();
        assert_eq!(next.event.response_time_ms, 5_000);
        assert_eq!(s.summary(secs(75)).duration_ms, 15_000);
    }

    #[test]
    fn summary_while_paused_excludes_current_pause() {
        let mut s = session(2);
        grade(&mut s, Quality::Good, secs(10));
        s.pause(secs(20)).unwrap();

        let summary = s.summary(secs(320));
        assert_eq!(summary.duration_ms, 20_000);
        assert_eq!(summary.reviewed, 1);

        s.resume(secs(320)).unwrap();
        assert_eq!(s.summary(secs(325)).duration_ms, 25_000);
    }

    #[test]
    fn committed_state_replaces_queue_snapshot() {
        let mut s = session(2);
        s.reveal().unwrap();
        let card_id = s.current().unwrap().card.id;
        let prepared = s.prepare_submission(card_id, Quality::Good, &Sm2::default(), secs(1)).unwrap();
        assert_eq!(prepared.event.status_before, CardStatus::New);
        assert_eq!(prepared.new_state.status, CardStatus::Learning);
        assert_eq!(prepared.event.interval_after, 1);
        s.complete_submission(prepared, secs(1)).unwrap();
        assert_eq!(s.queue[0].state.repetitions, 1);
    }

    #[test]
    fn retention_is_zero_without_reviews() {
        let s = session(1);
        let summary = s.summary(secs(9));
        assert_eq!(summary.reviewed, 0);
        assert_eq!(summary.retention, 0.0);
    }

    #[test]
    fn complete_session_rejects_pause() {
        let mut s = session(1);
        grade(&mut s, Quality::Good, secs(1));
        assert_eq!(s.pause(secs(2)).unwrap_err(), CoreError::SessionComplete);
        assert_eq!(s.resume(secs(2)).unwrap_err(), CoreError::SessionComplete);
    }
}
