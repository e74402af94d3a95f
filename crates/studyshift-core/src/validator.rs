//! Pure placement validation against an immutable schedule view.
//!
//! Decides whether a candidate interval is legal against existing committed
//! sessions, fixed commitments, daily capacity, and the study window. All
//! checks are side-effect-free, deterministic, and order-independent:
//! validating the same candidate against the same state twice always returns
//! the same verdict.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::calendar::FixedCommitment;
use crate::error::ScheduleConflict;
use crate::session::Session;
use crate::settings::PlannerSettings;

const MINUTES_PER_DAY: i64 = 24 * 60;
const CAPACITY_EPSILON: f64 = 1e-6;

/// Why a candidate placement was rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Intersects a committed session or fixed commitment.
    Overlap,
    /// Falls outside the study window.
    OutsideWindow,
    /// The date's weekday is not in the work-day set.
    NonWorkDay,
    /// Daily available hours would be exceeded.
    CapacityExceeded,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectionReason::Overlap => "overlap",
            RejectionReason::OutsideWindow => "outside-window",
            RejectionReason::NonWorkDay => "non-work-day",
            RejectionReason::CapacityExceeded => "capacity-exceeded",
        };
        f.write_str(text)
    }
}

/// Verdict for a candidate placement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Ok,
    Rejected { reason: RejectionReason },
}

impl Verdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }
}

/// A candidate slot for new work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlacementCandidate {
    pub task_id: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Hours of work the slot would hold.
    pub hours: f64,
}

pub(crate) fn minute_of_day(t: NaiveTime) -> i64 {
    t.num_seconds_from_midnight() as i64 / 60
}

pub(crate) fn time_from_minute(minute: i64) -> NaiveTime {
    let clamped = minute.clamp(0, MINUTES_PER_DAY - 1);
    NaiveTime::from_hms_opt(clamped as u32 / 60, clamped as u32 % 60, 0).unwrap_or(NaiveTime::MIN)
}

/// Validates candidate placements against an immutable view of existing
/// sessions, fixed commitments, and planner settings.
pub struct PlacementValidator<'a> {
    sessions: &'a [Session],
    commitments: &'a [FixedCommitment],
    settings: &'a PlannerSettings,
}

impl<'a> PlacementValidator<'a> {
    pub fn new(
        sessions: &'a [Session],
        commitments: &'a [FixedCommitment],
        settings: &'a PlannerSettings,
    ) -> Self {
        Self {
            sessions,
            commitments,
            settings,
        }
    }

    /// Busy intervals on a date in minutes of day, inflated by the slot
    /// margin, sorted and merged.
    fn busy_minutes(&self, date: NaiveDate) -> Vec<(i64, i64)> {
        let margin = self.settings.slot_margin_minutes;
        let mut busy: Vec<(i64, i64)> = Vec::new();

        for session in self
            .sessions
            .iter()
            .filter(|s| s.date == date && s.state.occupies_calendar())
        {
            busy.push((
                (minute_of_day(session.start) - margin).max(0),
                (minute_of_day(session.end) + margin).min(MINUTES_PER_DAY),
            ));
        }
        for commitment in self.commitments.iter().filter(|c| c.applies_on(date)) {
            if commitment.all_day {
                busy.push((0, MINUTES_PER_DAY));
            } else {
                busy.push((
                    (minute_of_day(commitment.start) - margin).max(0),
                    (minute_of_day(commitment.end) + margin).min(MINUTES_PER_DAY),
                ));
            }
        }

        busy.sort_unstable();
        let mut merged: Vec<(i64, i64)> = Vec::with_capacity(busy.len());
        for (start, end) in busy {
            match merged.last_mut() {
                Some((_, last_end)) if start <= *last_end => *last_end = (*last_end).max(end),
                _ => merged.push((start, end)),
            }
        }
        merged
    }

    /// True iff the candidate interval, inclusive of the slot margin, does
    /// not intersect any committed session or fixed commitment on the date.
    pub fn is_slot_free(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        let (s, e) = (minute_of_day(start), minute_of_day(end));
        self.busy_minutes(date)
            .iter()
            .all(|(bs, be)| e <= *bs || s >= *be)
    }

    /// True iff the date's weekday is eligible for study work.
    pub fn is_work_day(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        self.settings.is_work_day(date.weekday())
    }

    /// True iff the interval lies inside the study window on a work day.
    pub fn fits_study_window(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        start >= self.settings.window_start && end <= self.settings.window_end && self.is_work_day(date)
    }

    /// True iff already-committed hours plus the additional duration stay
    /// within the daily available hours.
    pub fn within_daily_capacity(&self, date: NaiveDate, additional_hours: f64) -> bool {
        let committed: f64 = self
            .sessions
            .iter()
            .filter(|s| s.date == date && s.state.occupies_calendar())
            .map(|s| s.allocated_hours)
            .sum();
        committed + additional_hours <= self.settings.daily_available_hours + CAPACITY_EPSILON
    }

    /// Compose all placement checks, returning the first failing reason.
    pub fn validate_placement(&self, candidate: &PlacementCandidate) -> Verdict {
        if !self.is_slot_free(candidate.date, candidate.start, candidate.end) {
            return Verdict::Rejected {
                reason: RejectionReason::Overlap,
            };
        }
        if candidate.start < self.settings.window_start || candidate.end > self.settings.window_end
        {
            return Verdict::Rejected {
                reason: RejectionReason::OutsideWindow,
            };
        }
        if !self.is_work_day(candidate.date) {
            return Verdict::Rejected {
                reason: RejectionReason::NonWorkDay,
            };
        }
        if !self.within_daily_capacity(candidate.date, candidate.hours) {
            return Verdict::Rejected {
                reason: RejectionReason::CapacityExceeded,
            };
        }
        Verdict::Ok
    }

    /// Free intervals inside the study window on a date, in minutes of day.
    pub(crate) fn free_gap_minutes(&self, date: NaiveDate) -> Vec<(i64, i64)> {
        let window_start = minute_of_day(self.settings.window_start);
        let window_end = minute_of_day(self.settings.window_end);
        let mut gaps = Vec::new();
        let mut cursor = window_start;

        for (busy_start, busy_end) in self.busy_minutes(date) {
            if busy_start >= window_end {
                break;
            }
            if busy_start > cursor {
                gaps.push((cursor, busy_start.min(window_end)));
            }
            cursor = cursor.max(busy_end);
        }
        if cursor < window_end {
            gaps.push((cursor, window_end));
        }
        gaps.retain(|(s, e)| e > s);
        gaps
    }

    /// Free intervals inside the study window on a date.
    pub fn free_gaps(&self, date: NaiveDate) -> Vec<(NaiveTime, NaiveTime)> {
        self.free_gap_minutes(date)
            .into_iter()
            .map(|(s, e)| (time_from_minute(s), time_from_minute(e)))
            .collect()
    }
}

fn session_label(session: &Session) -> String {
    format!("{} #{}", session.task_id, session.sequence)
}

/// Post-hoc integrity sweep over a batch of committed placements.
///
/// Asserts that no two calendar-occupying sessions on the same date overlap
/// and that none overlaps a fixed commitment. Used after a pass commits, as a
/// last-line defense against compounding errors from independent per-slot
/// checks.
pub fn validate_final_schedule(
    sessions: &[Session],
    commitments: &[FixedCommitment],
) -> Result<(), ScheduleConflict> {
    let occupying: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.state.occupies_calendar())
        .collect();

    for (i, a) in occupying.iter().enumerate() {
        for b in occupying.iter().skip(i + 1) {
            if a.overlaps(b) {
                return Err(ScheduleConflict {
                    date: a.date,
                    first: session_label(a),
                    first_start: a.start,
                    first_end: a.end,
                    second: session_label(b),
                    second_start: b.start,
                    second_end: b.end,
                });
            }
        }
        for commitment in commitments {
            if commitment.blocks(a.date, a.start, a.end) {
                return Err(ScheduleConflict {
                    date: a.date,
                    first: session_label(a),
                    first_start: a.start,
                    first_end: a.end,
                    second: commitment.name.clone(),
                    second_start: commitment.start,
                    second_end: commitment.end,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use chrono::Weekday;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2025-03-10 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn session(date: NaiveDate, start: NaiveTime, end: NaiveTime, hours: f64) -> Session {
        Session::new("task-1", date, start, end, hours, 1)
    }

    fn candidate(date: NaiveDate, start: NaiveTime, end: NaiveTime, hours: f64) -> PlacementCandidate {
        PlacementCandidate {
            task_id: "task-2".to_string(),
            date,
            start,
            end,
            hours,
        }
    }

    #[test]
    fn free_slot_accepted() {
        let settings = PlannerSettings::default();
        let sessions = vec![session(monday(), t(9, 0), t(10, 0), 1.0)];
        let validator = PlacementValidator::new(&sessions, &[], &settings);

        let verdict = validator.validate_placement(&candidate(monday(), t(10, 0), t(11, 0), 1.0));
        assert_eq!(verdict, Verdict::Ok);
    }

    #[test]
    fn overlapping_slot_rejected() {
        let settings = PlannerSettings::default();
        let sessions = vec![session(monday(), t(9, 0), t(10, 0), 1.0)];
        let validator = PlacementValidator::new(&sessions, &[], &settings);

        let verdict = validator.validate_placement(&candidate(monday(), t(9, 30), t(10, 30), 1.0));
        assert_eq!(
            verdict,
            Verdict::Rejected {
                reason: RejectionReason::Overlap
            }
        );
    }

    #[test]
    fn missed_sessions_do_not_block_slots() {
        let settings = PlannerSettings::default();
        let mut missed = session(monday(), t(9, 0), t(10, 0), 1.0);
        missed.state = SessionState::MissedOriginal;
        let sessions = vec![missed];
        let validator = PlacementValidator::new(&sessions, &[], &settings);

        assert!(validator.is_slot_free(monday(), t(9, 0), t(10, 0)));
    }

    #[test]
    fn margin_inflates_busy_intervals() {
        let settings = PlannerSettings {
            slot_margin_minutes: 15,
            ..Default::default()
        };
        let sessions = vec![session(monday(), t(9, 0), t(10, 0), 1.0)];
        let validator = PlacementValidator::new(&sessions, &[], &settings);

        assert!(!validator.is_slot_free(monday(), t(10, 0), t(11, 0)));
        assert!(validator.is_slot_free(monday(), t(10, 15), t(11, 0)));
    }

    #[test]
    fn outside_window_rejected() {
        let settings = PlannerSettings::default();
        let validator = PlacementValidator::new(&[], &[], &settings);

        let verdict = validator.validate_placement(&candidate(monday(), t(7, 0), t(8, 0), 1.0));
        assert_eq!(
            verdict,
            Verdict::Rejected {
                reason: RejectionReason::OutsideWindow
            }
        );
    }

    #[test]
    fn non_work_day_rejected() {
        let settings = PlannerSettings {
            work_days: vec![Weekday::Tue],
            ..Default::default()
        };
        let validator = PlacementValidator::new(&[], &[], &settings);

        let verdict = validator.validate_placement(&candidate(monday(), t(9, 0), t(10, 0), 1.0));
        assert_eq!(
            verdict,
            Verdict::Rejected {
                reason: RejectionReason::NonWorkDay
            }
        );
    }

    #[test]
    fn capacity_exceeded_rejected() {
        let settings = PlannerSettings {
            daily_available_hours: 2.0,
            ..Default::default()
        };
        let sessions = vec![session(monday(), t(9, 0), t(10, 30), 1.5)];
        let validator = PlacementValidator::new(&sessions, &[], &settings);

        let verdict = validator.validate_placement(&candidate(monday(), t(11, 0), t(12, 0), 1.0));
        assert_eq!(
            verdict,
            Verdict::Rejected {
                reason: RejectionReason::CapacityExceeded
            }
        );
    }

    #[test]
    fn all_day_commitment_rejects_whole_date() {
        let settings = PlannerSettings::default();
        let commitments = vec![FixedCommitment::all_day("Exam day", monday())];
        let validator = PlacementValidator::new(&[], &commitments, &settings);

        assert!(!validator.is_slot_free(monday(), t(9, 0), t(9, 30)));
        assert!(validator.free_gap_minutes(monday()).is_empty());
    }

    #[test]
    fn verdict_is_stable_across_repeated_calls() {
        let settings = PlannerSettings::default();
        let sessions = vec![session(monday(), t(9, 0), t(10, 0), 1.0)];
        let validator = PlacementValidator::new(&sessions, &[], &settings);
        let c = candidate(monday(), t(9, 30), t(10, 30), 1.0);

        assert_eq!(validator.validate_placement(&c), validator.validate_placement(&c));
    }

    #[test]
    fn free_gaps_between_commitments() {
        let settings = PlannerSettings::default();
        let commitments = vec![
            FixedCommitment::once("Lecture", monday(), t(10, 0), t(12, 0)),
            FixedCommitment::once("Club", monday(), t(15, 0), t(16, 0)),
        ];
        let validator = PlacementValidator::new(&[], &commitments, &settings);

        let gaps = validator.free_gaps(monday());
        assert_eq!(
            gaps,
            vec![
                (t(9, 0), t(10, 0)),
                (t(12, 0), t(15, 0)),
                (t(16, 0), t(21, 0)),
            ]
        );
    }

    #[test]
    fn final_sweep_detects_overlap() {
        let a = session(monday(), t(9, 0), t(10, 0), 1.0);
        let mut b = session(monday(), t(9, 30), t(10, 30), 1.0);
        b.task_id = "task-2".to_string();

        let err = validate_final_schedule(&[a, b], &[]).unwrap_err();
        assert_eq!(err.date, monday());
        assert!(err.to_string().contains("task-1 #1"));
    }

    #[test]
    fn final_sweep_detects_commitment_overlap() {
        let sessions = vec![session(monday(), t(9, 0), t(10, 0), 1.0)];
        let commitments = vec![FixedCommitment::once("Lecture", monday(), t(9, 30), t(11, 0))];

        assert!(validate_final_schedule(&sessions, &commitments).is_err());
    }

    #[test]
    fn final_sweep_accepts_disjoint_days() {
        let a = session(monday(), t(9, 0), t(12, 0), 3.0);
        let b = session(monday().succ_opt().unwrap(), t(9, 0), t(12, 0), 3.0);

        assert!(validate_final_schedule(&[a, b], &[]).is_ok());
    }
}
