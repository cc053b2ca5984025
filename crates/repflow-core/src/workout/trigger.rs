use serde::{Deserialize, Serialize};

use super::engine::{AdvanceToken, WorkoutEngine, WorkoutState};
use crate::routine::Measurement;

/// How the current activity gets finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TriggerMode {
    /// Counting down; fires on its own at zero.
    Countdown { remaining_secs: u32 },
    /// Waits for "mark complete" or a voice keyword.
    Manual { rep_count: u32 },
    /// Paused or complete.
    Inactive,
}

impl TriggerMode {
    pub fn for_engine(engine: &WorkoutEngine) -> Self {
        if engine.state() != WorkoutState::Running {
            return TriggerMode::Inactive;
        }
        match engine.current_activity().map(|a| a.measurement) {
            Some(Measurement::Time { .. }) => TriggerMode::Countdown {
                remaining_secs: engine.remaining_secs().unwrap_or(0),
            },
            Some(Measurement::Reps { count }) => TriggerMode::Manual { rep_count: count },
            None => TriggerMode::Inactive,
        }
    }
}

/// In-process countdown for time-based activities.
///
/// Polled once per tick; yields the activity's token the first time its
/// time is used up and never again for that activity.
#[derive(Debug, Default)]
pub struct CompletionTrigger {
    fired_for: Option<AdvanceToken>,
}

impl CompletionTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll(&mut self, engine: &WorkoutEngine) -> Option<AdvanceToken> {
        if !engine.time_expired() {
            return None;
        }
        let token = engine.current_token();
        if self.fired_for == Some(token) {
            return None;
        }
        self.fired_for = Some(token);
        Some(token)
    }
}
