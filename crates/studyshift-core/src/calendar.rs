//! Task and fixed-commitment types.
//!
//! Tasks own the work being planned; fixed commitments are immovable
//! calendar blocks that constrain every placement decision but never
//! participate in redistribution themselves.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::RedistributionError;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created but no work started.
    Pending,
    /// Work in progress.
    Active,
    /// All work finished. Done tasks are never redistributed.
    Done,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

/// A unit of required work with a deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier.
    pub id: String,
    /// Task title.
    pub title: String,
    /// Point in time by which all work must be finished.
    pub deadline: NaiveDateTime,
    /// Importance tier. Important tasks outrank everything else during
    /// redistribution.
    pub important: bool,
    /// Estimated total duration in hours.
    pub estimated_hours: f64,
    /// Lifecycle status.
    pub status: TaskStatus,
}

impl Task {
    /// Create a new pending task.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        deadline: NaiveDateTime,
        estimated_hours: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            deadline,
            important: false,
            estimated_hours,
            status: TaskStatus::Pending,
        }
    }

    /// Mark the task important.
    pub fn important(mut self) -> Self {
        self.important = true;
        self
    }
}

/// When a fixed commitment occurs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentSchedule {
    /// Single occurrence on one date.
    Once(NaiveDate),
    /// Recurs weekly on the given weekdays.
    Weekly(Vec<Weekday>),
}

/// An immovable calendar block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixedCommitment {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Occurrence rule.
    pub schedule: CommitmentSchedule,
    /// Block start time. Ignored for all-day blocks.
    pub start: NaiveTime,
    /// Block end time. Ignored for all-day blocks.
    pub end: NaiveTime,
    /// All-day blocks reject the entire date.
    pub all_day: bool,
}

impl FixedCommitment {
    /// Create a single-occurrence commitment.
    pub fn once(
        name: impl Into<String>,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            schedule: CommitmentSchedule::Once(date),
            start,
            end,
            all_day: false,
        }
    }

    /// Create a weekly recurring commitment.
    pub fn weekly(
        name: impl Into<String>,
        days: Vec<Weekday>,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            schedule: CommitmentSchedule::Weekly(days),
            start,
            end,
            all_day: false,
        }
    }

    /// Create an all-day block on one date.
    pub fn all_day(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            schedule: CommitmentSchedule::Once(date),
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
            all_day: true,
        }
    }

    /// Check whether the commitment occurs on a date.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        match &self.schedule {
            CommitmentSchedule::Once(d) => *d == date,
            CommitmentSchedule::Weekly(days) => days.contains(&date.weekday()),
        }
    }

    /// Check whether the commitment blocks a candidate interval on a date.
    pub fn blocks(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        if !self.applies_on(date) {
            return false;
        }
        if self.all_day {
            return true;
        }
        start < self.end && end > self.start
    }

    /// Reject malformed commitment data.
    pub fn validate(&self) -> Result<(), RedistributionError> {
        if let CommitmentSchedule::Weekly(days) = &self.schedule {
            if days.is_empty() {
                return Err(RedistributionError::InvalidFixedCommitment {
                    id: self.id.clone(),
                    message: "weekly recurrence has no weekdays".to_string(),
                });
            }
        }
        if !self.all_day && self.start >= self.end {
            return Err(RedistributionError::InvalidFixedCommitment {
                id: self.id.clone(),
                message: format!("start ({}) is not before end ({})", self.start, self.end),
            });
        }
        Ok(())
    }
}
