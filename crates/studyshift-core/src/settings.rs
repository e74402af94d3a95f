//! TOML-based planner settings.
//!
//! Capacity and window constraints consulted by every placement decision:
//! daily available hours, study-window bounds, eligible weekdays, buffer
//! days before redistributed work may land, and the minimum session length.
//!
//! Settings are plain data; the host application decides where the TOML
//! file lives and when to reload it.

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Planner settings consulted by the validator and the redistribution engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannerSettings {
    /// Maximum hours of study work that may be committed on a single day.
    #[serde(default = "default_daily_available_hours")]
    pub daily_available_hours: f64,
    /// Start of the daily study window.
    #[serde(default = "default_window_start")]
    pub window_start: NaiveTime,
    /// End of the daily study window.
    #[serde(default = "default_window_end")]
    pub window_end: NaiveTime,
    /// Weekdays eligible for study work.
    #[serde(default = "default_work_days")]
    pub work_days: Vec<Weekday>,
    /// Minimum lead time, in days from "now", before redistributed work
    /// may be placed.
    #[serde(default = "default_buffer_days")]
    pub buffer_days: i64,
    /// Shortest session the planner will create, in hours.
    #[serde(default = "default_min_session_hours")]
    pub min_session_hours: f64,
    /// Margin kept free before and after every placed interval, in minutes.
    #[serde(default)]
    pub slot_margin_minutes: i64,
}

fn default_daily_available_hours() -> f64 {
    4.0
}
fn default_window_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
}
fn default_window_end() -> NaiveTime {
    NaiveTime::from_hms_opt(21, 0, 0).unwrap_or_default()
}
fn default_work_days() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
}
fn default_buffer_days() -> i64 {
    1
}
fn default_min_session_hours() -> f64 {
    0.5
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            daily_available_hours: default_daily_available_hours(),
            window_start: default_window_start(),
            window_end: default_window_end(),
            work_days: default_work_days(),
            buffer_days: default_buffer_days(),
            min_session_hours: default_min_session_hours(),
            slot_margin_minutes: 0,
        }
    }
}

impl PlannerSettings {
    /// Load settings from a TOML file. Missing fields fall back to defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let settings: PlannerSettings =
            toml::from_str(&raw).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings as TOML.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, raw).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Check internal consistency of the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daily_available_hours <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "daily_available_hours".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.window_start >= self.window_end {
            return Err(ConfigError::InvalidValue {
                key: "window_start".to_string(),
                message: "study window start must precede its end".to_string(),
            });
        }
        if self.work_days.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "work_days".to_string(),
                message: "at least one work day is required".to_string(),
            });
        }
        if self.buffer_days < 0 {
            return Err(ConfigError::InvalidValue {
                key: "buffer_days".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        if self.min_session_hours <= 0.0 || self.min_session_hours > self.daily_available_hours {
            return Err(ConfigError::InvalidValue {
                key: "min_session_hours".to_string(),
                message: "must be positive and no larger than daily_available_hours".to_string(),
            });
        }
        if self.slot_margin_minutes < 0 {
            return Err(ConfigError::InvalidValue {
                key: "slot_margin_minutes".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// Check whether a date's weekday is eligible for study work.
    pub fn is_work_day(&self, weekday: Weekday) -> bool {
        self.work_days.contains(&weekday)
    }
}
