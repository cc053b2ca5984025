//! Mirror of the engine state on an external, persistent surface
//! (an "ongoing workout" notification, a native background timer).
//!
//! The mirror is fed the engine explicitly on every call; it keeps no
//! reference to a global "current workout". When the in-process ticker is
//! not running (app backgrounded) it can also act as the source of advance
//! signals, computing elapsed time on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::routine::{Measurement, MeasurementKind};
use crate::workout::{AdvanceToken, WorkoutEngine, WorkoutState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub routine_name: String,
    pub activity_name: String,
    pub measurement: MeasurementKind,
    /// Seconds left for time-based activities, target reps otherwise.
    pub remaining_or_reps: u32,
    pub paused: bool,
    pub progress: f64,
    pub draining: bool,
    /// Whether a "postpone" action may be offered on the surface.
    pub can_defer: bool,
}

impl NotificationPayload {
    /// `None` once the run is complete; there is nothing left to show.
    pub fn from_engine(engine: &WorkoutEngine) -> Option<Self> {
        if engine.state() == WorkoutState::Complete {
            return None;
        }
        let activity = engine.current_activity()?;
        let remaining_or_reps = match activity.measurement {
            Measurement::Time { .. } => engine.remaining_secs().unwrap_or(0),
            Measurement::Reps { count } => count,
        };
        Some(Self {
            routine_name: engine.routine().name.clone(),
            activity_name: activity.name.clone(),
            measurement: activity.measurement.kind(),
            remaining_or_reps,
            paused: engine.state() == WorkoutState::Paused,
            progress: engine.progress(),
            draining: engine.is_draining(),
            can_defer: engine.can_defer(),
        })
    }
}

/// An updatable surface that only goes away when stopped.
pub trait NotificationSurface: Send {
    fn start(&mut self, payload: &NotificationPayload) -> Result<(), NotifyError>;
    fn update(&mut self, payload: &NotificationPayload) -> Result<(), NotifyError>;
    fn stop(&mut self) -> Result<(), NotifyError>;
}

/// Surface that writes the payload to the log.
#[derive(Debug, Default)]
pub struct LogSurface;

impl NotificationSurface for LogSurface {
    fn start(&mut self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        tracing::info!(routine = %payload.routine_name, activity = %payload.activity_name, "workout notification shown");
        Ok(())
    }

    fn update(&mut self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        debug!(
            activity = %payload.activity_name,
            remaining = payload.remaining_or_reps,
            paused = payload.paused,
            progress = payload.progress,
            "workout notification updated"
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), NotifyError> {
        tracing::info!("workout notification removed");
        Ok(())
    }
}

pub struct NotificationSync<S: NotificationSurface> {
    surface: S,
    enabled: bool,
    shown: bool,
    last_fired: Option<DateTime<Utc>>,
}

impl<S: NotificationSurface> NotificationSync<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            enabled: true,
            shown: false,
            last_fired: None,
        }
    }

    /// A mirror that never touches its surface.
    pub fn disabled(surface: S) -> Self {
        let mut sync = Self::new(surface);
        sync.enabled = false;
        sync
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Show or refresh the surface. Failures are logged and dropped; a lost
    /// mirror never affects the run.
    pub fn publish(&mut self, engine: &WorkoutEngine) {
        if !self.enabled {
            return;
        }
        let Some(payload) = NotificationPayload::from_engine(engine) else {
            self.stop();
            return;
        };
        let result = if self.shown {
            self.surface.update(&payload)
        } else {
            self.surface.start(&payload).map(|()| self.shown = true)
        };
        if let Err(e) = result {
            warn!(error = %e, "notification update failed");
        }
    }

    /// Advance source for when the in-process countdown cannot run.
    ///
    /// Elapsed time is `now - activity start - paused time`. Each activity
    /// start timestamp yields at most one token, so overlapping with the
    /// in-process countdown cannot advance twice.
    pub fn background_tick(&mut self, engine: &WorkoutEngine) -> Option<AdvanceToken> {
        if engine.state() != WorkoutState::Running {
            return None;
        }
        let duration_ms = u64::from(engine.current_activity()?.measurement.duration_secs()?) * 1000;
        let started = engine.activity_started_at();
        let wall_ms = (engine.now() - started).num_milliseconds().max(0) as u64;
        let elapsed_ms = wall_ms.saturating_sub(engine.activity_paused_ms());
        if elapsed_ms < duration_ms || self.last_fired == Some(started) {
            return None;
        }
        self.last_fired = Some(started);
        debug!(token = engine.current_token().value(), "background sync crossed activity end");
        Some(engine.current_token())
    }

    /// Tear the surface down. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if !self.shown {
            return;
        }
        self.shown = false;
        if let Err(e) = self.surface.stop() {
            warn!(error = %e, "failed to remove workout notification");
        }
    }
}

impl<S: NotificationSurface> Drop for NotificationSync<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
