//! Task-aware redistribution of outstanding work.
//!
//! The unit of redistribution is a task's entire outstanding work, not any
//! single missed slot: all incomplete sessions (past and future) are
//! discarded and the true remaining hours are re-derived from the estimate
//! minus completed work, then re-placed greedily into validated future slots.
//! A legacy per-session mode is kept for callers that only want individual
//! missed slots moved.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::calendar::{FixedCommitment, Task};
use crate::error::RedistributionError;
use crate::meta::{RedistributionEvent, SlotRef};
use crate::session::{Schedule, Session, SessionState};
use crate::settings::PlannerSettings;
use crate::validator::{time_from_minute, PlacementCandidate, PlacementValidator, Verdict};

/// New sessions snap to this granularity.
const PLACEMENT_STEP_MINUTES: i64 = 15;

pub(crate) fn hours_to_minutes(hours: f64) -> i64 {
    (hours * 60.0).round() as i64
}

pub(crate) fn minutes_to_hours(minutes: i64) -> f64 {
    minutes as f64 / 60.0
}

/// Options recognized by a redistribution pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedistributionOptions {
    /// Bound on the day-enumeration horizon, counted from "now".
    pub max_redistribution_days: i64,
    /// Restrict the pass to sessions in this set. A task is eligible when at
    /// least one of its missed sessions is targeted.
    pub target_session_ids: Option<BTreeSet<String>>,
    /// Redistribute whole tasks (default) or move missed sessions
    /// individually.
    pub use_task_aware_mode: bool,
}

impl Default for RedistributionOptions {
    fn default() -> Self {
        Self {
            max_redistribution_days: 30,
            target_session_ids: None,
            use_task_aware_mode: true,
        }
    }
}

impl RedistributionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_redistribution_days(mut self, days: i64) -> Self {
        self.max_redistribution_days = days;
        self
    }

    pub fn with_target_session_ids(mut self, ids: BTreeSet<String>) -> Self {
        self.target_session_ids = Some(ids);
        self
    }

    pub fn with_task_aware_mode(mut self, enabled: bool) -> Self {
        self.use_task_aware_mode = enabled;
        self
    }
}

/// Outcome of redistributing one task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskRedistribution {
    /// Sessions discarded by the pass, with their final states.
    pub removed_sessions: Vec<Session>,
    /// Replacement sessions committed to the working copy.
    pub new_sessions: Vec<Session>,
    /// Hours that could not be placed before the deadline.
    pub unplaced_hours: f64,
    /// Structured reasons for any unplaced remainder.
    pub failure_reasons: Vec<String>,
}

impl TaskRedistribution {
    /// Hours successfully re-placed.
    pub fn hours_redistributed(&self) -> f64 {
        self.new_sessions.iter().map(|s| s.allocated_hours).sum()
    }

    /// Whether the task's full remainder found a slot.
    pub fn is_complete(&self) -> bool {
        self.failure_reasons.is_empty()
    }
}

/// Places one task's outstanding work into future slots on a working copy of
/// the schedule.
pub(crate) struct RedistributionEngine<'a> {
    settings: &'a PlannerSettings,
    options: &'a RedistributionOptions,
    commitments: &'a [FixedCommitment],
}

impl<'a> RedistributionEngine<'a> {
    pub(crate) fn new(
        settings: &'a PlannerSettings,
        options: &'a RedistributionOptions,
        commitments: &'a [FixedCommitment],
    ) -> Self {
        Self {
            settings,
            options,
            commitments,
        }
    }

    /// Redistribute a single task on the working copy.
    ///
    /// Returns `NegativeRemainingWork` without touching the schedule when
    /// completed hours exceed the estimate; every other failure is recovered
    /// into `failure_reasons` on the returned record.
    pub(crate) fn redistribute_task(
        &self,
        working: &mut Schedule,
        task: &Task,
        now: NaiveDateTime,
    ) -> Result<TaskRedistribution, RedistributionError> {
        let completed_hours: f64 = working
            .sessions
            .iter()
            .filter(|s| s.task_id == task.id && s.state == SessionState::Completed)
            .map(Session::effective_hours)
            .sum();

        let remaining_hours = task.estimated_hours - completed_hours;
        if hours_to_minutes(remaining_hours) < 0 {
            return Err(RedistributionError::NegativeRemainingWork {
                task_id: task.id.clone(),
                completed_hours,
                estimated_hours: task.estimated_hours,
            });
        }

        // Sequence numbers of removed sessions are never reused, so the next
        // number is captured before any removal.
        let next_sequence = working.next_sequence(&task.id);

        let mut removed = self.collect_for_removal(working, task);
        removed.sort_by_key(|s| s.sequence);

        let to_place_minutes = if self.options.use_task_aware_mode {
            hours_to_minutes(remaining_hours)
        } else {
            removed.iter().map(|s| hours_to_minutes(s.allocated_hours)).sum()
        };

        // First placement of previously-unplanned work stays `scheduled`;
        // anything replacing an existing slot is `redistributed`.
        let new_state = if removed.is_empty() {
            SessionState::Scheduled
        } else {
            SessionState::Redistributed
        };
        let new_sessions =
            self.place_remaining(working, task, to_place_minutes, next_sequence, new_state, now);
        let placed_minutes: i64 = new_sessions
            .iter()
            .map(|s| hours_to_minutes(s.allocated_hours))
            .sum();
        let unplaced_minutes = to_place_minutes - placed_minutes;
        let fully_placed = unplaced_minutes == 0;

        for session in &mut removed {
            session.state = match session.state {
                SessionState::MissedOriginal => {
                    if fully_placed {
                        SessionState::Redistributed
                    } else {
                        SessionState::FailedRedistribution
                    }
                }
                // Future sessions superseded by the re-plan.
                _ => SessionState::SkippedSystem,
            };
        }

        let mut failure_reasons = Vec::new();
        if !fully_placed {
            failure_reasons.push(
                RedistributionError::NoLegalSlot {
                    task_id: task.id.clone(),
                    unplaced_hours: minutes_to_hours(unplaced_minutes),
                    deadline: task.deadline,
                }
                .to_string(),
            );
        }

        self.record_meta(working, task, &removed, &new_sessions, &failure_reasons, now);

        Ok(TaskRedistribution {
            removed_sessions: removed,
            new_sessions,
            unplaced_hours: minutes_to_hours(unplaced_minutes),
            failure_reasons,
        })
    }

    /// Remove the sessions this pass supersedes and return them.
    ///
    /// Task-aware mode collects every incomplete session of the task, past
    /// and future; legacy mode collects only missed ones (honoring the
    /// target set when present).
    fn collect_for_removal(&self, working: &mut Schedule, task: &Task) -> Vec<Session> {
        let task_aware = self.options.use_task_aware_mode;
        let target = self.options.target_session_ids.as_ref();
        let mut removed = Vec::new();
        working.sessions.retain(|s| {
            let collect = s.task_id == task.id
                && if task_aware {
                    s.state.is_incomplete()
                } else {
                    s.state == SessionState::MissedOriginal
                        && target.map_or(true, |ids| ids.contains(&s.id))
                };
            if collect {
                removed.push(s.clone());
            }
            !collect
        });
        removed
    }

    /// Greedily place minutes into candidate days, chronologically, one
    /// session per day, consulting the validator for every candidate slot.
    fn place_remaining(
        &self,
        working: &mut Schedule,
        task: &Task,
        to_place_minutes: i64,
        next_sequence: u32,
        state: SessionState,
        now: NaiveDateTime,
    ) -> Vec<Session> {
        let min_session_minutes = hours_to_minutes(self.settings.min_session_hours);
        let daily_minutes = hours_to_minutes(self.settings.daily_available_hours);
        let first_day = now.date() + Duration::days(self.settings.buffer_days);
        let horizon = task
            .deadline
            .date()
            .min(now.date() + Duration::days(self.options.max_redistribution_days));

        let mut new_sessions = Vec::new();
        let mut remaining = to_place_minutes;
        let mut sequence = next_sequence;
        let mut day = first_day;

        while day <= horizon && remaining >= min_session_minutes {
            if let Some(candidate) = self.best_slot_on(working, task, day, remaining, daily_minutes)
            {
                let session = Session::replacement(
                    task.id.clone(),
                    candidate.date,
                    candidate.start,
                    candidate.end,
                    candidate.hours,
                    sequence,
                    state,
                );
                remaining -= hours_to_minutes(candidate.hours);
                sequence += 1;
                new_sessions.push(session.clone());
                working.sessions.push(session);
            }
            day += Duration::days(1);
        }
        new_sessions
    }

    /// Largest validated block the day can still take, earliest gap on ties.
    fn best_slot_on(
        &self,
        working: &Schedule,
        task: &Task,
        day: NaiveDate,
        remaining_minutes: i64,
        daily_minutes: i64,
    ) -> Option<PlacementCandidate> {
        let min_session_minutes = hours_to_minutes(self.settings.min_session_hours);
        let validator =
            PlacementValidator::new(&working.sessions, self.commitments, self.settings);
        if !validator.is_work_day(day) {
            return None;
        }

        let committed_minutes: i64 = working
            .sessions
            .iter()
            .filter(|s| s.date == day && s.state.occupies_calendar())
            .map(|s| hours_to_minutes(s.allocated_hours))
            .sum();
        let bound = remaining_minutes.min(daily_minutes - committed_minutes);
        if bound < min_session_minutes {
            return None;
        }

        let mut best: Option<(i64, i64)> = None;
        for (gap_start, gap_end) in validator.free_gap_minutes(day) {
            let block = quantize_down(bound.min(gap_end - gap_start));
            if block < min_session_minutes {
                continue;
            }
            // Strictly-greater keeps the earliest gap on ties.
            if best.map_or(true, |(_, b)| block > b) {
                best = Some((gap_start, block));
            }
        }

        let (start_minute, block) = best?;
        let candidate = PlacementCandidate {
            task_id: task.id.clone(),
            date: day,
            start: time_from_minute(start_minute),
            end: time_from_minute(start_minute + block),
            hours: minutes_to_hours(block),
        };
        match validator.validate_placement(&candidate) {
            Verdict::Ok => Some(candidate),
            Verdict::Rejected { .. } => None,
        }
    }

    /// Record the pass in the task's accumulated metadata.
    fn record_meta(
        &self,
        working: &mut Schedule,
        task: &Task,
        removed: &[Session],
        new_sessions: &[Session],
        failure_reasons: &[String],
        now: NaiveDateTime,
    ) {
        let meta = working.meta.entry(task.id.clone()).or_default();
        if meta.original_slot.is_none() {
            meta.original_slot = removed.first().map(SlotRef::from);
        }

        if removed.len() == new_sessions.len() {
            for (old, new) in removed.iter().zip(new_sessions) {
                meta.history.push(RedistributionEvent {
                    from: Some(SlotRef::from(old)),
                    to: Some(SlotRef::from(new)),
                    at: now,
                    reason: "redistributed".to_string(),
                });
            }
        } else if !removed.is_empty() || !new_sessions.is_empty() {
            meta.history.push(RedistributionEvent {
                from: removed.first().map(SlotRef::from),
                to: new_sessions.first().map(SlotRef::from),
                at: now,
                reason: format!(
                    "re-planned: {} session(s) replaced by {}",
                    removed.len(),
                    new_sessions.len()
                ),
            });
        }

        meta.successful_moves += new_sessions.len() as u32;
        meta.last_processed_at = Some(now);
        meta.failure_reasons.extend(failure_reasons.iter().cloned());
        let task_sessions: Vec<&Session> = working
            .sessions
            .iter()
            .filter(|s| s.task_id == task.id)
            .collect();
        meta.refresh_session_states(task_sessions.into_iter());
    }
}

fn quantize_down(minutes: i64) -> i64 {
    minutes - minutes % PLACEMENT_STEP_MINUTES
}
