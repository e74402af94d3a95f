//! Session lifecycle types and the schedule snapshot.
//!
//! A session is one scheduled, time-boxed occurrence of work toward a task.
//! Sessions follow strict state transitions:
//!
//!   SCHEDULED ──────> IN_PROGRESS ──────> COMPLETED
//!       |                  |
//!       | (end in past)    | (end in past)
//!       v                  v
//!   MISSED_ORIGINAL <──────+
//!       |        \
//!       |         \──> FAILED_REDISTRIBUTION
//!       v
//!   REDISTRIBUTED
//!
//! SCHEDULED may also terminate as SKIPPED_USER (user cancels) or
//! SKIPPED_SYSTEM (superseded or dropped by the planner). COMPLETED,
//! REDISTRIBUTED, FAILED_REDISTRIBUTION and both SKIPPED states are terminal
//! for that session instance; a new session with a fresh sequence number may
//! later be created for the same task.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::meta::TaskMeta;

/// Lifecycle state of a planned work session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Planned but not yet started.
    Scheduled,
    /// Work has started and is ongoing.
    InProgress,
    /// Work finished; actual hours and completion timestamp recorded.
    Completed,
    /// Scheduled end passed without completion.
    MissedOriginal,
    /// Work re-placed into a new slot (set on removed originals and on the
    /// replacement sessions the planner creates).
    Redistributed,
    /// No legal slot existed before the task deadline.
    FailedRedistribution,
    /// Cancelled by the user.
    SkippedUser,
    /// Dropped or superseded by the planner.
    SkippedSystem,
}

impl SessionState {
    /// Check if a transition is valid.
    pub fn can_transition_to(&self, to: &SessionState) -> bool {
        match self {
            SessionState::Scheduled => matches!(
                to,
                SessionState::InProgress
                    | SessionState::MissedOriginal
                    | SessionState::SkippedUser
                    | SessionState::SkippedSystem
            ),
            SessionState::InProgress => {
                matches!(to, SessionState::Completed | SessionState::MissedOriginal)
            }
            SessionState::MissedOriginal => matches!(
                to,
                SessionState::Redistributed | SessionState::FailedRedistribution
            ),
            // Terminal states
            SessionState::Completed
            | SessionState::Redistributed
            | SessionState::FailedRedistribution
            | SessionState::SkippedUser
            | SessionState::SkippedSystem => false,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed
                | SessionState::Redistributed
                | SessionState::FailedRedistribution
                | SessionState::SkippedUser
                | SessionState::SkippedSystem
        )
    }

    /// States representing outstanding, not-yet-finished work.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            SessionState::Scheduled | SessionState::InProgress | SessionState::MissedOriginal
        )
    }

    /// States whose sessions occupy calendar time and constrain placements.
    pub fn occupies_calendar(&self) -> bool {
        matches!(
            self,
            SessionState::Scheduled | SessionState::InProgress | SessionState::Redistributed
        )
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Scheduled
    }
}

/// Attempted invalid session state transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid session transition from {from:?} to {to:?}")]
pub struct SessionTransitionError {
    pub from: SessionState,
    pub to: SessionState,
}

/// One scheduled occurrence of work toward a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Unique identifier.
    pub id: String,
    /// Owning task identifier.
    pub task_id: String,
    /// Calendar date of the slot.
    pub date: NaiveDate,
    /// Slot start time.
    pub start: NaiveTime,
    /// Slot end time.
    pub end: NaiveTime,
    /// Hours of work allocated to this slot. Always positive.
    pub allocated_hours: f64,
    /// Monotonically increasing sequence number scoping the session within
    /// its task. Sequence numbers of removed sessions are never reused.
    pub sequence: u32,
    /// Lifecycle state.
    pub state: SessionState,
    /// Hours actually worked, recorded on completion.
    pub actual_hours: Option<f64>,
    /// Completion timestamp.
    pub completed_at: Option<NaiveDateTime>,
}

impl Session {
    /// Create a new scheduled session.
    pub fn new(
        task_id: impl Into<String>,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        allocated_hours: f64,
        sequence: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            date,
            start,
            end,
            allocated_hours,
            sequence,
            state: SessionState::Scheduled,
            actual_hours: None,
            completed_at: None,
        }
    }

    /// Create a replacement session produced by a redistribution pass.
    pub(crate) fn replacement(
        task_id: impl Into<String>,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        allocated_hours: f64,
        sequence: u32,
        state: SessionState,
    ) -> Self {
        Self {
            state,
            ..Self::new(task_id, date, start, end, allocated_hours, sequence)
        }
    }

    /// Scheduled start as a timestamp.
    pub fn start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    /// Scheduled end as a timestamp.
    pub fn end_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end)
    }

    /// Actual hours when recorded, allocated hours otherwise.
    pub fn effective_hours(&self) -> f64 {
        self.actual_hours.unwrap_or(self.allocated_hours)
    }

    /// Check whether two sessions occupy overlapping time on the same date.
    pub fn overlaps(&self, other: &Session) -> bool {
        self.date == other.date && self.start < other.end && self.end > other.start
    }

    /// Transition to a new state, rejecting transitions the lifecycle
    /// does not allow.
    pub fn transition_to(&mut self, to: SessionState) -> Result<(), SessionTransitionError> {
        if !self.state.can_transition_to(&to) {
            return Err(SessionTransitionError {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Mark the session completed, recording actual hours worked.
    pub fn complete(
        &mut self,
        actual_hours: f64,
        at: NaiveDateTime,
    ) -> Result<(), SessionTransitionError> {
        if self.state == SessionState::Scheduled {
            self.transition_to(SessionState::InProgress)?;
        }
        self.transition_to(SessionState::Completed)?;
        self.actual_hours = Some(actual_hours);
        self.completed_at = Some(at);
        Ok(())
    }
}

/// Immutable snapshot of a study plan: every session plus the accumulated
/// per-task redistribution bookkeeping.
///
/// A redistribution pass clones the snapshot, works on the clone, and either
/// returns it as the new committed schedule or discards it on rollback.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub sessions: Vec<Session>,
    /// Per-task redistribution metadata, accumulated across passes.
    #[serde(default)]
    pub meta: BTreeMap<String, TaskMeta>,
}

impl Schedule {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self {
            sessions,
            meta: BTreeMap::new(),
        }
    }

    /// Sessions placed on a given date.
    pub fn sessions_on(&self, date: NaiveDate) -> impl Iterator<Item = &Session> {
        self.sessions.iter().filter(move |s| s.date == date)
    }

    /// Hours already committed on a date by calendar-occupying sessions.
    pub fn committed_hours_on(&self, date: NaiveDate) -> f64 {
        self.sessions_on(date)
            .filter(|s| s.state.occupies_calendar())
            .map(|s| s.allocated_hours)
            .sum()
    }

    /// Next unused sequence number for a task. Computed over every session
    /// currently in the snapshot, so callers must capture it before removing
    /// sessions they intend to replace.
    pub fn next_sequence(&self, task_id: &str) -> u32 {
        self.sessions
            .iter()
            .filter(|s| s.task_id == task_id)
            .map(|s| s.sequence)
            .max()
            .map_or(1, |m| m + 1)
    }
}
