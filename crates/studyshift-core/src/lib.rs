//! # Studyshift Core Library
//!
//! This library provides the core replanning logic for Studyshift: detecting
//! study sessions that failed to occur as planned, deriving the true
//! remaining work per task, and re-placing that work into future time slots
//! without violating calendar, capacity, or work-day constraints.
//!
//! ## Architecture
//!
//! - **Classifier**: pure partition of sessions against an injected "now";
//!   the only mutation is marking newly missed sessions
//! - **Priority Engine**: deterministic importance-and-urgency ordering of
//!   redistribution candidates
//! - **Validator**: side-effect-free placement checks over an immutable view
//!   of sessions, fixed commitments, and settings
//! - **Redistribution Engine**: task-aware re-planning of a task's entire
//!   outstanding work, not individual slots
//! - **Orchestrator**: the transactional pass; working-copy-then-commit with
//!   all-or-nothing rollback on cross-task conflict
//!
//! Persistence, first-pass plan generation, and UI presentation are caller
//! concerns; the core operates on snapshots it is handed and returns new
//! snapshots.
//!
//! ## Key Components
//!
//! - [`Redistributor`]: runs a full redistribution pass
//! - [`PlacementValidator`]: pre-checks a manual move
//! - [`classify_sessions`]: lifecycle bucketing with missed-marking
//! - [`PlannerSettings`]: capacity and window constraints (TOML-backed)

pub mod calendar;
pub mod classifier;
pub mod error;
pub mod meta;
pub mod orchestrator;
pub mod priority;
pub mod redistribution;
pub mod session;
pub mod settings;
pub mod validator;

pub use calendar::{CommitmentSchedule, FixedCommitment, Task, TaskStatus};
pub use classifier::{classify_sessions, Classification};
pub use error::{ConfigError, RedistributionError, ScheduleConflict};
pub use meta::{RedistributionEvent, SlotRef, TaskMeta};
pub use orchestrator::{PassOutcome, RedistributionFeedback, RedistributionResult, Redistributor};
pub use priority::{Candidate, PriorityEngine};
pub use redistribution::{RedistributionOptions, TaskRedistribution};
pub use session::{Schedule, Session, SessionState, SessionTransitionError};
pub use settings::PlannerSettings;
pub use validator::{
    validate_final_schedule, PlacementCandidate, PlacementValidator, RejectionReason, Verdict,
};
