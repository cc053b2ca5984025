use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::routine::Measurement;
use crate::workout::{ActivityOutcome, AdvanceToken, WorkoutState};

/// Every engine state change produces an Event.
/// The UI layer renders them; the notification mirror is refreshed after each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    WorkoutStarted {
        routine_id: String,
        routine_name: String,
        total_activities: usize,
        at: DateTime<Utc>,
    },
    ActivityStarted {
        token: AdvanceToken,
        activity_id: String,
        activity_name: String,
        measurement: Measurement,
        block_index: usize,
        /// 1-based.
        repetition: u32,
        draining: bool,
        /// Postponing is only offered when there is a later point to resume at.
        can_defer: bool,
        at: DateTime<Utc>,
    },
    ActivityFinished {
        activity_id: String,
        activity_name: String,
        outcome: ActivityOutcome,
        at: DateTime<Utc>,
    },
    /// The normal sequence is exhausted and postponed activities are now due.
    DrainStarted {
        queued: usize,
        at: DateTime<Utc>,
    },
    WorkoutPaused {
        remaining_secs: Option<u32>,
        at: DateTime<Utc>,
    },
    WorkoutResumed {
        remaining_secs: Option<u32>,
        at: DateTime<Utc>,
    },
    WorkoutCompleted {
        routine_id: String,
        completed_activities: usize,
        total_activities: usize,
        at: DateTime<Utc>,
    },
    /// The run was left before completion; nothing is recorded.
    WorkoutAbandoned {
        routine_id: String,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: WorkoutState,
        activity_name: Option<String>,
        measurement: Option<Measurement>,
        remaining_secs: Option<u32>,
        progress: f64,
        draining: bool,
        postponed: usize,
        can_defer: bool,
        at: DateTime<Utc>,
    },
}
