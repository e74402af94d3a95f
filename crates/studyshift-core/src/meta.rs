//! Per-task redistribution bookkeeping.
//!
//! A closed, typed record accumulated across passes: where the work
//! originally sat, every move it has been through, and why any portion
//! failed. No open-ended key-value bags.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::session::{Session, SessionState};

/// A calendar slot reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotRef {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl From<&Session> for SlotRef {
    fn from(session: &Session) -> Self {
        Self {
            date: session.date,
            start: session.start,
            end: session.end,
        }
    }
}

/// One redistribution event in a task's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedistributionEvent {
    /// Old slot, when a direct correspondence exists.
    pub from: Option<SlotRef>,
    /// New slot, when a direct correspondence exists.
    pub to: Option<SlotRef>,
    pub at: NaiveDateTime,
    pub reason: String,
}

/// Accumulated redistribution metadata for one task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskMeta {
    /// Slot of the task's first session, captured on the first pass that
    /// touches the task.
    pub original_slot: Option<SlotRef>,
    /// Ordered history of redistribution events.
    pub history: Vec<RedistributionEvent>,
    /// Structured failure messages from every pass.
    pub failure_reasons: Vec<String>,
    /// Count of successfully placed replacement sessions.
    pub successful_moves: u32,
    /// When a redistribution pass last touched this task.
    pub last_processed_at: Option<NaiveDateTime>,
    /// Priority score computed on the most recent pass.
    pub last_priority_score: Option<i64>,
    /// Aggregated view of the task's current session states.
    pub session_states: BTreeMap<SessionState, usize>,
}

impl TaskMeta {
    /// Recompute the aggregated session-state view from the task's sessions.
    pub fn refresh_session_states<'a>(&mut self, sessions: impl Iterator<Item = &'a Session>) {
        let mut counts: BTreeMap<SessionState, usize> = BTreeMap::new();
        for session in sessions {
            *counts.entry(session.state).or_insert(0) += 1;
        }
        self.session_states = counts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn session(seq: u32, state: SessionState) -> Session {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let mut s = Session::new("task-1", date, start, end, 1.0, seq);
        s.state = state;
        s
    }

    #[test]
    fn refresh_counts_states() {
        let sessions = vec![
            session(1, SessionState::Completed),
            session(2, SessionState::Redistributed),
            session(3, SessionState::Redistributed),
        ];
        let mut meta = TaskMeta::default();
        meta.refresh_session_states(sessions.iter());

        assert_eq!(meta.session_states.get(&SessionState::Completed), Some(&1));
        assert_eq!(meta.session_states.get(&SessionState::Redistributed), Some(&2));
        assert_eq!(meta.session_states.get(&SessionState::Scheduled), None);
    }

    #[test]
    fn meta_serialization_round_trip() {
        let s = session(1, SessionState::MissedOriginal);
        let mut meta = TaskMeta::default();
        meta.original_slot = Some(SlotRef::from(&s));
        meta.history.push(RedistributionEvent {
            from: Some(SlotRef::from(&s)),
            to: None,
            at: s.end_at(),
            reason: "re-planned".to_string(),
        });
        meta.refresh_session_states(std::iter::once(&s));

        let json = serde_json::to_string(&meta).unwrap();
        let decoded: TaskMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, meta);
    }
}
