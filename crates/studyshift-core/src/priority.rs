//! Redistribution priority scoring.
//!
//! Scores tasks that lost work so they are re-placed in a deterministic,
//! importance-and-urgency-aware order. The score is additive over four
//! independently capped components:
//!
//! - importance flag: fixed 1000 when set
//! - deadline urgency: up to 500, saturating once less than a day remains
//!   and decaying linearly to zero at thirty days out
//! - session age: 2 points per hour since the oldest missed slot ended,
//!   up to 200
//! - session size: 25 points per lost hour, up to 100 (a tie-break, not a
//!   dominant factor)
//!
//! Priority is derived fresh on every pass and never persisted.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::calendar::Task;
use crate::session::{Session, SessionState};

/// Score contributed by the importance flag.
pub const IMPORTANCE_CAP: i64 = 1000;
/// Maximum deadline-urgency score.
pub const URGENCY_CAP: i64 = 500;
/// Maximum session-age score.
pub const AGE_CAP: i64 = 200;
/// Maximum session-size score.
pub const SIZE_CAP: i64 = 100;

/// Remaining time at or below which urgency saturates to its cap.
const URGENCY_FLOOR_HOURS: i64 = 24;
/// Remaining time at or beyond which urgency decays to zero.
const URGENCY_CEILING_HOURS: i64 = 720;
const AGE_POINTS_PER_HOUR: i64 = 2;
const SIZE_POINTS_PER_HOUR: f64 = 25.0;

/// A task queued for redistribution, with its ranking keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub task_id: String,
    /// Composite score in `[0, 1800]`.
    pub score: i64,
    pub important: bool,
    pub deadline: NaiveDateTime,
    /// Earliest original slot among the task's outstanding sessions.
    pub earliest_slot: NaiveDateTime,
}

/// Scores and orders redistribution candidates.
#[derive(Debug, Clone, Default)]
pub struct PriorityEngine;

impl PriorityEngine {
    pub fn new() -> Self {
        Self
    }

    /// Composite score for a task and its outstanding session group.
    pub fn score(&self, task: &Task, group: &[&Session], now: NaiveDateTime) -> i64 {
        let importance = if task.important { IMPORTANCE_CAP } else { 0 };
        importance
            + Self::urgency_score(task.deadline, now)
            + Self::age_score(group, now)
            + Self::size_score(group)
    }

    /// Deadline urgency, monotonically non-increasing in remaining time and
    /// saturating at both ends.
    fn urgency_score(deadline: NaiveDateTime, now: NaiveDateTime) -> i64 {
        let remaining_hours = (deadline - now).num_hours();
        if remaining_hours <= URGENCY_FLOOR_HOURS {
            URGENCY_CAP
        } else if remaining_hours >= URGENCY_CEILING_HOURS {
            0
        } else {
            URGENCY_CAP * (URGENCY_CEILING_HOURS - remaining_hours)
                / (URGENCY_CEILING_HOURS - URGENCY_FLOOR_HOURS)
        }
    }

    /// Elapsed time since the oldest missed slot ended. Older misses outrank
    /// newer ones, all else equal.
    fn age_score(group: &[&Session], now: NaiveDateTime) -> i64 {
        group
            .iter()
            .filter(|s| s.state == SessionState::MissedOriginal)
            .map(|s| (now - s.end_at()).num_hours().max(0) * AGE_POINTS_PER_HOUR)
            .max()
            .unwrap_or(0)
            .min(AGE_CAP)
    }

    /// Total outstanding hours. Larger chunks of lost work are slightly
    /// preferred.
    fn size_score(group: &[&Session]) -> i64 {
        let hours: f64 = group.iter().map(|s| s.allocated_hours).sum();
        ((hours * SIZE_POINTS_PER_HOUR).round() as i64).min(SIZE_CAP)
    }

    /// Rank tasks for redistribution, highest priority first.
    ///
    /// The returned order is a deterministic total order: score descending,
    /// then importance, earlier deadline, earlier original slot, task id.
    pub fn rank(
        &self,
        tasks: &[&Task],
        sessions: &[Session],
        now: NaiveDateTime,
    ) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = tasks
            .iter()
            .map(|task| {
                let group: Vec<&Session> = sessions
                    .iter()
                    .filter(|s| s.task_id == task.id && s.state.is_incomplete())
                    .collect();
                let earliest_slot = group
                    .iter()
                    .map(|s| s.start_at())
                    .min()
                    .unwrap_or(task.deadline);
                Candidate {
                    task_id: task.id.clone(),
                    score: self.score(task, &group, now),
                    important: task.important,
                    deadline: task.deadline,
                    earliest_slot,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.important.cmp(&a.important))
                .then(a.deadline.cmp(&b.deadline))
                .then(a.earliest_slot.cmp(&b.earliest_slot))
                .then(a.task_id.cmp(&b.task_id))
        });
        candidates
    }
}
