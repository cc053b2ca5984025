//! Per-activity outcomes and the completed-session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityOutcome {
    Completed,
    Skipped,
    /// Deferred and not yet drained.
    Postponed,
    PostponedThenCompleted,
}

impl ActivityOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            ActivityOutcome::Completed | ActivityOutcome::PostponedThenCompleted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityOutcome::Completed => "completed",
            ActivityOutcome::Skipped => "skipped",
            ActivityOutcome::Postponed => "postponed",
            ActivityOutcome::PostponedThenCompleted => "postponed_then_completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(ActivityOutcome::Completed),
            "skipped" => Some(ActivityOutcome::Skipped),
            "postponed" => Some(ActivityOutcome::Postponed),
            "postponed_then_completed" => Some(ActivityOutcome::PostponedThenCompleted),
            _ => None,
        }
    }
}

/// One entry per executed position. A deferred activity keeps its record
/// and is updated in place when it is drained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_id: String,
    pub activity_name: String,
    pub block_index: usize,
    /// 1-based.
    pub repetition: u32,
    /// `None` while the activity is current.
    pub outcome: Option<ActivityOutcome>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub paused_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub id: String,
    pub routine_id: String,
    pub routine_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Wall-clock seconds from start to completion, pauses included.
    pub duration_secs: u64,
    pub paused_secs: u64,
    pub total_activities: usize,
    pub completed_activities: usize,
    pub skipped_activities: usize,
    pub timeline: Vec<ActivityRecord>,
}

impl CompletedSession {
    pub fn active_secs(&self) -> u64 {
        self.duration_secs.saturating_sub(self.paused_secs)
    }
}
