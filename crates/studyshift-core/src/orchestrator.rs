//! Transactional redistribution pass.
//!
//! Drives the full pass across every task needing redistribution, operating
//! on a working copy of the schedule. After each task commits, the
//! accumulated working copy is swept for cross-task conflicts; any conflict
//! discards the working copy entirely and returns the original schedule
//! unchanged. There is no partial-commit-then-repair: rollback is
//! all-or-nothing for the pass.
//!
//! The pass is synchronous and logically non-reentrant. Callers that expose
//! it from a UI thread should serialize passes per schedule; the
//! working-copy-then-commit protocol assumes no interleaving writer.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::calendar::{FixedCommitment, Task, TaskStatus};
use crate::classifier::classify_sessions;
use crate::error::RedistributionError;
use crate::priority::PriorityEngine;
use crate::redistribution::{RedistributionEngine, RedistributionOptions, TaskRedistribution};
use crate::session::{Schedule, SessionState};
use crate::settings::PlannerSettings;
use crate::validator::validate_final_schedule;

/// Aggregate feedback for one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RedistributionFeedback {
    /// Human-readable summary for display.
    pub message: String,
    /// Number of tasks the pass touched.
    pub tasks_processed: usize,
    /// Hours successfully re-placed across all tasks.
    pub total_hours_redistributed: f64,
}

/// Result of a redistribution pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RedistributionResult {
    /// True iff no rollback occurred and every processed task placed its
    /// full remainder.
    pub success: bool,
    /// Per-task outcome, keyed by task id.
    pub redistribution: BTreeMap<String, TaskRedistribution>,
    pub feedback: RedistributionFeedback,
}

/// A pass outcome: the schedule to commit plus the result report.
///
/// On success `schedule` is the new snapshot; on rollback it is the original
/// input, unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassOutcome {
    pub schedule: Schedule,
    pub result: RedistributionResult,
}

/// Runs transactional redistribution passes.
#[derive(Debug, Clone, Default)]
pub struct Redistributor {
    settings: PlannerSettings,
    options: RedistributionOptions,
}

impl Redistributor {
    /// Create a redistributor with default options.
    pub fn new(settings: PlannerSettings) -> Self {
        Self {
            settings,
            options: RedistributionOptions::default(),
        }
    }

    /// Override the pass options.
    pub fn with_options(mut self, options: RedistributionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    pub fn options(&self) -> &RedistributionOptions {
        &self.options
    }

    /// Run one redistribution pass over an immutable schedule snapshot.
    ///
    /// The input schedule is never mutated; the returned outcome carries
    /// either the new snapshot or, after a rollback, a copy of the original.
    pub fn redistribute(
        &self,
        schedule: &Schedule,
        tasks: &[Task],
        commitments: &[FixedCommitment],
        now: NaiveDateTime,
    ) -> PassOutcome {
        for commitment in commitments {
            if let Err(err) = commitment.validate() {
                return Self::aborted(schedule, err.to_string());
            }
        }

        let mut working = schedule.clone();
        classify_sessions(&mut working.sessions, now);

        let eligible: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Done)
            .filter(|t| {
                working.sessions.iter().any(|s| {
                    s.task_id == t.id
                        && s.state == SessionState::MissedOriginal
                        && self
                            .options
                            .target_session_ids
                            .as_ref()
                            .map_or(true, |ids| ids.contains(&s.id))
                })
            })
            .collect();

        if eligible.is_empty() {
            return PassOutcome {
                schedule: working,
                result: RedistributionResult {
                    success: true,
                    redistribution: BTreeMap::new(),
                    feedback: RedistributionFeedback {
                        message: "No sessions needed redistribution.".to_string(),
                        tasks_processed: 0,
                        total_hours_redistributed: 0.0,
                    },
                },
            };
        }

        let engine = RedistributionEngine::new(&self.settings, &self.options, commitments);
        let ranked = PriorityEngine::new().rank(&eligible, &working.sessions, now);
        let mut redistribution: BTreeMap<String, TaskRedistribution> = BTreeMap::new();

        for candidate in &ranked {
            let Some(task) = tasks.iter().find(|t| t.id == candidate.task_id) else {
                continue;
            };

            match engine.redistribute_task(&mut working, task, now) {
                Ok(outcome) => {
                    // Cross-task interactions are checked after every commit;
                    // per-slot checks alone cannot see them compound.
                    if let Err(conflict) =
                        validate_final_schedule(&working.sessions, commitments)
                    {
                        let err = RedistributionError::CrossTaskConflict(conflict);
                        return Self::aborted(schedule, err.to_string());
                    }
                    if let Some(meta) = working.meta.get_mut(&task.id) {
                        meta.last_priority_score = Some(candidate.score);
                    }
                    redistribution.insert(task.id.clone(), outcome);
                }
                Err(err) => {
                    // Data inconsistency: skip the offending task, keep going.
                    let meta = working.meta.entry(task.id.clone()).or_default();
                    meta.failure_reasons.push(err.to_string());
                    meta.last_processed_at = Some(now);
                    redistribution.insert(
                        task.id.clone(),
                        TaskRedistribution {
                            failure_reasons: vec![err.to_string()],
                            ..Default::default()
                        },
                    );
                }
            }
        }

        let tasks_processed = redistribution.len();
        let total_hours_redistributed: f64 = redistribution
            .values()
            .map(TaskRedistribution::hours_redistributed)
            .sum();
        let failed = redistribution
            .values()
            .filter(|r| !r.is_complete())
            .count();
        let success = failed == 0;
        let message = if success {
            format!(
                "Redistributed {:.2}h across {} task(s).",
                total_hours_redistributed, tasks_processed
            )
        } else {
            format!(
                "Redistributed {:.2}h across {} task(s); {} task(s) could not be fully replanned.",
                total_hours_redistributed, tasks_processed, failed
            )
        };

        PassOutcome {
            schedule: working,
            result: RedistributionResult {
                success,
                redistribution,
                feedback: RedistributionFeedback {
                    message,
                    tasks_processed,
                    total_hours_redistributed,
                },
            },
        }
    }

    /// Discard all work and return the original schedule with a failure
    /// report.
    fn aborted(original: &Schedule, reason: String) -> PassOutcome {
        PassOutcome {
            schedule: original.clone(),
            result: RedistributionResult {
                success: false,
                redistribution: BTreeMap::new(),
                feedback: RedistributionFeedback {
                    message: format!("Pass rolled back: {}", reason),
                    tasks_processed: 0,
                    total_hours_redistributed: 0.0,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use chrono::{NaiveDate, NaiveTime};

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn now() -> NaiveDateTime {
        day(11).and_hms_opt(20, 0, 0).unwrap()
    }

    fn missed(task_id: &str, d: u32, hours: f64, seq: u32) -> Session {
        let end = NaiveTime::from_hms_opt(9 + hours as u32, 0, 0).unwrap();
        Session::new(task_id, day(d), t(9), end, hours, seq)
    }

    #[test]
    fn no_op_pass_returns_unchanged_schedule() {
        let redistributor = Redistributor::new(PlannerSettings::default());
        let schedule = Schedule::new(vec![Session::new(
            "task-1",
            day(14),
            t(9),
            t(10),
            1.0,
            1,
        )]);
        let tasks = vec![Task::new("task-1", "Essay", day(20).and_time(t(20)), 4.0)];

        let outcome = redistributor.redistribute(&schedule, &tasks, &[], now());

        assert!(outcome.result.success);
        assert!(outcome.result.redistribution.is_empty());
        assert_eq!(outcome.schedule, schedule);
    }

    #[test]
    fn done_tasks_are_ignored() {
        let redistributor = Redistributor::new(PlannerSettings::default());
        let schedule = Schedule::new(vec![missed("task-1", 10, 1.0, 1)]);
        let mut task = Task::new("task-1", "Essay", day(20).and_time(t(20)), 4.0);
        task.status = TaskStatus::Done;

        let outcome = redistributor.redistribute(&schedule, &[task], &[], now());
        assert!(outcome.result.redistribution.is_empty());
    }

    #[test]
    fn invalid_commitment_aborts_the_pass() {
        let redistributor = Redistributor::new(PlannerSettings::default());
        let schedule = Schedule::new(vec![missed("task-1", 10, 1.0, 1)]);
        let tasks = vec![Task::new("task-1", "Essay", day(20).and_time(t(20)), 4.0)];
        let broken = FixedCommitment::once("Broken", day(12), t(11), t(10));

        let outcome = redistributor.redistribute(&schedule, &tasks, &[broken], now());

        assert!(!outcome.result.success);
        assert_eq!(outcome.schedule, schedule);
        assert!(outcome.result.feedback.message.contains("rolled back"));
    }

    #[test]
    fn cross_task_conflict_rolls_back_everything() {
        let redistributor = Redistributor::new(PlannerSettings::default());

        // A pre-existing overlap between two committed sessions that the pass
        // itself never touches; the post-commit sweep must catch it.
        let stray_a = Session::new("task-2", day(14), t(9), t(11), 2.0, 1);
        let stray_b = Session::new("task-3", day(14), t(10), t(12), 2.0, 1);
        let schedule = Schedule::new(vec![missed("task-1", 10, 1.0, 1), stray_a, stray_b]);
        let tasks = vec![Task::new("task-1", "Essay", day(20).and_time(t(20)), 4.0)];

        let outcome = redistributor.redistribute(&schedule, &tasks, &[], now());

        assert!(!outcome.result.success);
        assert!(outcome.result.redistribution.is_empty());
        assert_eq!(outcome.schedule, schedule);
        assert!(outcome
            .result
            .feedback
            .message
            .contains("cross-task conflict"));
    }

    #[test]
    fn feedback_counts_hours_and_tasks() {
        let redistributor = Redistributor::new(PlannerSettings::default());
        let schedule = Schedule::new(vec![missed("task-1", 10, 2.0, 1)]);
        let tasks = vec![Task::new("task-1", "Essay", day(20).and_time(t(20)), 2.0)];

        let outcome = redistributor.redistribute(&schedule, &tasks, &[], now());

        assert!(outcome.result.success);
        assert_eq!(outcome.result.feedback.tasks_processed, 1);
        assert!((outcome.result.feedback.total_hours_redistributed - 2.0).abs() < 1e-9);
        assert!(outcome.result.feedback.message.contains("2.00h"));
    }

    #[test]
    fn priority_score_recorded_in_meta() {
        let redistributor = Redistributor::new(PlannerSettings::default());
        let schedule = Schedule::new(vec![missed("task-1", 10, 1.0, 1)]);
        let tasks = vec![Task::new("task-1", "Essay", day(14).and_time(t(20)), 1.0)];

        let outcome = redistributor.redistribute(&schedule, &tasks, &[], now());
        let meta = outcome.schedule.meta.get("task-1").unwrap();
        assert!(meta.last_priority_score.is_some());
        assert!(meta.last_priority_score.unwrap() > 0);
    }
}
