//! Session state classification against an injected "now".
//!
//! A session is missed iff its scheduled end is strictly in the past and it
//! never reached COMPLETED. Classification is an explicit, pure function of
//! the injected timestamp, never a background timer, so passes are
//! deterministic and reproducible.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::session::{Session, SessionState};

/// Partition of sessions by lifecycle bucket, holding session ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    /// Missed sessions, including ones already marked on earlier passes.
    pub missed: Vec<String>,
    /// Future or ongoing sessions.
    pub active: Vec<String>,
    /// Completed sessions.
    pub completed: Vec<String>,
    /// Other terminal sessions (redistributed, failed, skipped).
    pub terminal: Vec<String>,
}

impl Classification {
    /// Whether any session needs redistribution.
    pub fn has_missed(&self) -> bool {
        !self.missed.is_empty()
    }

    /// Total number of classified sessions.
    pub fn total(&self) -> usize {
        self.missed.len() + self.active.len() + self.completed.len() + self.terminal.len()
    }
}

/// Partition sessions into lifecycle buckets, marking newly missed sessions.
///
/// The single side effect is the `scheduled`/`in_progress` to
/// `missed_original` transition for sessions whose end passed without
/// completion. Reclassifying an already-missed session is a no-op, and
/// completed or terminal sessions are never touched.
pub fn classify_sessions(sessions: &mut [Session], now: NaiveDateTime) -> Classification {
    let mut classification = Classification::default();

    for session in sessions.iter_mut() {
        if matches!(
            session.state,
            SessionState::Scheduled | SessionState::InProgress
        ) && session.end_at() < now
        {
            session.state = SessionState::MissedOriginal;
        }

        match session.state {
            SessionState::MissedOriginal => classification.missed.push(session.id.clone()),
            SessionState::Scheduled | SessionState::InProgress => {
                classification.active.push(session.id.clone())
            }
            SessionState::Completed => classification.completed.push(session.id.clone()),
            SessionState::Redistributed
            | SessionState::FailedRedistribution
            | SessionState::SkippedUser
            | SessionState::SkippedSystem => classification.terminal.push(session.id.clone()),
        }
    }

    classification
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn session_at(day: u32, start_h: u32, end_h: u32, state: SessionState) -> Session {
        let mut s = Session::new(
            "task-1",
            NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            NaiveTime::from_hms_opt(start_h, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(end_h, 0, 0).unwrap(),
            (end_h - start_h) as f64,
            1,
        );
        s.state = state;
        s
    }

    fn noon(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn past_scheduled_session_becomes_missed() {
        let mut sessions = vec![session_at(10, 9, 10, SessionState::Scheduled)];
        let classification = classify_sessions(&mut sessions, noon(11));

        assert_eq!(sessions[0].state, SessionState::MissedOriginal);
        assert_eq!(classification.missed, vec![sessions[0].id.clone()]);
    }

    #[test]
    fn past_in_progress_session_becomes_missed() {
        let mut sessions = vec![session_at(10, 9, 10, SessionState::InProgress)];
        classify_sessions(&mut sessions, noon(11));
        assert_eq!(sessions[0].state, SessionState::MissedOriginal);
    }

    #[test]
    fn future_session_stays_active() {
        let mut sessions = vec![session_at(12, 9, 10, SessionState::Scheduled)];
        let classification = classify_sessions(&mut sessions, noon(11));

        assert_eq!(sessions[0].state, SessionState::Scheduled);
        assert_eq!(classification.active.len(), 1);
        assert!(classification.missed.is_empty());
    }

    #[test]
    fn session_ending_exactly_now_is_not_missed() {
        let mut sessions = vec![session_at(11, 11, 12, SessionState::Scheduled)];
        let classification = classify_sessions(&mut sessions, noon(11));

        // End == now is not strictly in the past.
        assert_eq!(sessions[0].state, SessionState::Scheduled);
        assert!(classification.missed.is_empty());
    }

    #[test]
    fn completed_session_is_never_reclassified() {
        let mut sessions = vec![session_at(10, 9, 10, SessionState::Completed)];
        let classification = classify_sessions(&mut sessions, noon(11));

        assert_eq!(sessions[0].state, SessionState::Completed);
        assert_eq!(classification.completed.len(), 1);
    }

    #[test]
    fn classification_is_idempotent() {
        let mut sessions = vec![
            session_at(10, 9, 10, SessionState::Scheduled),
            session_at(12, 9, 10, SessionState::Scheduled),
            session_at(10, 10, 11, SessionState::Completed),
        ];

        let first = classify_sessions(&mut sessions, noon(11));
        let second = classify_sessions(&mut sessions, noon(11));
        assert_eq!(first, second);
        assert_eq!(second.total(), 3);
    }

    #[test]
    fn terminal_states_bucketed_separately() {
        let mut sessions = vec![
            session_at(10, 9, 10, SessionState::Redistributed),
            session_at(10, 10, 11, SessionState::SkippedUser),
            session_at(10, 11, 12, SessionState::FailedRedistribution),
        ];
        let classification = classify_sessions(&mut sessions, noon(11));
        assert_eq!(classification.terminal.len(), 3);
        assert!(classification.missed.is_empty());
    }
}
