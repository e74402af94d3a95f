//! Core error types for studyshift-core.
//!
//! This module defines the error hierarchy using thiserror. Redistribution
//! errors carry structured fields so callers can render actionable messages;
//! none of them is ever raised as a panic from library code.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::path::PathBuf;
use thiserror::Error;

/// Two blocks occupying overlapping time on the same date.
///
/// Produced by the post-pass integrity sweep. The labels identify the
/// conflicting blocks for display (session `task #seq` or commitment name).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "schedule conflict on {date}: '{first}' ({first_start}-{first_end}) overlaps '{second}' ({second_start}-{second_end})"
)]
pub struct ScheduleConflict {
    pub date: NaiveDate,
    pub first: String,
    pub first_start: NaiveTime,
    pub first_end: NaiveTime,
    pub second: String,
    pub second_start: NaiveTime,
    pub second_end: NaiveTime,
}

/// Redistribution error taxonomy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RedistributionError {
    /// Completed hours exceed the task estimate. Signals upstream data
    /// corruption; the offending task is skipped and reported, never crashed on.
    #[error(
        "completed hours ({completed_hours:.2}) exceed estimate ({estimated_hours:.2}) for task {task_id}"
    )]
    NegativeRemainingWork {
        task_id: String,
        completed_hours: f64,
        estimated_hours: f64,
    },

    /// Remaining work cannot fit before the task deadline. Recovered per task;
    /// the pass continues and the unplaced remainder is reported.
    #[error(
        "insufficient capacity: {unplaced_hours:.2}h unplaced before deadline {deadline} for task {task_id}"
    )]
    NoLegalSlot {
        task_id: String,
        unplaced_hours: f64,
        deadline: NaiveDateTime,
    },

    /// Post-pass integrity check failed. Not locally recoverable: the whole
    /// pass is rolled back.
    #[error("cross-task conflict: {0}")]
    CrossTaskConflict(#[from] ScheduleConflict),

    /// Malformed immovable block data.
    #[error("invalid fixed commitment '{id}': {message}")]
    InvalidFixedCommitment { id: String, message: String },
}

/// Configuration-specific errors for planner settings I/O.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("failed to save settings to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("invalid settings value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type alias for RedistributionError.
pub type Result<T, E = RedistributionError> = std::result::Result<T, E>;
