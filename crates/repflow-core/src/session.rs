//! One live workout run.
//!
//! A [`WorkoutSession`] owns the engine together with everything that can
//! move it: the in-process countdown, the voice controller and the
//! notification mirror. They live and die as a unit; dropping the session
//! (or sending [`SessionCommand::Stop`]) tears all of them down and nothing
//! is recorded.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::HistoryError;
use crate::events::Event;
use crate::notify::{NotificationSurface, NotificationSync};
use crate::storage::HistoryStore;
use crate::workout::{
    AdvanceToken, CompletedSession, CompletionTrigger, VoiceController, VoiceMessage,
    WorkoutEngine, WorkoutState,
};

/// User actions and platform lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Pause,
    Resume,
    TogglePause,
    /// Finish the current activity (the manual path for reps-based ones).
    MarkComplete,
    Skip,
    Defer,
    /// The app went to the background; the in-process ticker is unreliable.
    Background,
    Foreground,
    Stop,
}

#[derive(Debug)]
pub enum SessionOutcome {
    Completed {
        session: CompletedSession,
        history_id: i64,
    },
    Abandoned,
}

pub struct WorkoutSession<S: NotificationSurface, H: HistoryStore> {
    engine: WorkoutEngine,
    trigger: CompletionTrigger,
    voice: VoiceController,
    voice_rx: mpsc::UnboundedReceiver<VoiceMessage>,
    notifications: NotificationSync<S>,
    history: H,
    tick_interval: Duration,
    backgrounded: bool,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl<S: NotificationSurface, H: HistoryStore> WorkoutSession<S, H> {
    pub fn new(
        engine: WorkoutEngine,
        voice: (VoiceController, mpsc::UnboundedReceiver<VoiceMessage>),
        notifications: NotificationSync<S>,
        history: H,
    ) -> Self {
        let (voice, voice_rx) = voice;
        Self {
            engine,
            trigger: CompletionTrigger::new(),
            voice,
            voice_rx,
            notifications,
            history,
            tick_interval: Duration::from_secs(1),
            backgrounded: false,
            events: None,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Forward every engine event to `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn engine(&self) -> &WorkoutEngine {
        &self.engine
    }

    /// Drive the run until it completes or is stopped.
    ///
    /// # Errors
    ///
    /// Returns the history store's error if the completed session cannot be
    /// saved. The save is not retried.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) -> Result<SessionOutcome, HistoryError> {
        self.emit(self.engine.started_event());
        if let Some(event) = self.engine.activity_started_event() {
            self.emit(event);
        }
        self.refresh();

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.engine.state() == WorkoutState::Complete {
                return self.finish();
            }
            tokio::select! {
                _ = ticker.tick() => self.on_tick(),
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::Stop) | None => return Ok(self.abandon()),
                    Some(cmd) => self.on_command(cmd),
                },
                Some(msg) = self.voice_rx.recv() => {
                    if let Some(token) = self.voice.handle(msg, &self.engine) {
                        debug!(token = token.value(), "completion keyword heard");
                        let events = self.engine.advance(token);
                        self.apply(events);
                    }
                    self.refresh();
                }
            }
        }
    }

    fn on_tick(&mut self) {
        let fired = if self.backgrounded {
            self.notifications.background_tick(&self.engine)
        } else {
            self.trigger.poll(&self.engine)
        };
        if let Some(token) = fired {
            let events = self.engine.advance(token);
            self.apply(events);
        }
        self.refresh();
    }

    fn on_command(&mut self, cmd: SessionCommand) {
        let token: AdvanceToken = self.engine.current_token();
        let events = match cmd {
            SessionCommand::Pause => self.engine.pause().into_iter().collect(),
            SessionCommand::Resume => self.engine.resume().into_iter().collect(),
            SessionCommand::TogglePause => self.engine.toggle_pause().into_iter().collect(),
            SessionCommand::MarkComplete => self.engine.advance(token),
            SessionCommand::Skip => self.engine.skip(token),
            SessionCommand::Defer => self.engine.defer(token),
            SessionCommand::Background => {
                debug!("backgrounded, notification sync drives the countdown");
                self.backgrounded = true;
                Vec::new()
            }
            SessionCommand::Foreground => {
                debug!("foregrounded");
                self.backgrounded = false;
                Vec::new()
            }
            SessionCommand::Stop => Vec::new(),
        };
        self.apply(events);
        // Listening and the mirror follow the new state before the next
        // command is read, so a pause silences everything immediately.
        self.refresh();
    }

    fn apply(&self, events: Vec<Event>) {
        for event in events {
            self.emit(event);
        }
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn refresh(&mut self) {
        self.voice.sync(&self.engine);
        self.notifications.publish(&self.engine);
    }

    fn finish(mut self) -> Result<SessionOutcome, HistoryError> {
        self.voice.stop();
        self.notifications.stop();
        let Some(session) = self.engine.completed_session() else {
            return Ok(SessionOutcome::Abandoned);
        };
        let history_id = self.history.save(&session)?;
        info!(history_id, routine = %session.routine_name, "workout saved");
        Ok(SessionOutcome::Completed {
            session,
            history_id,
        })
    }

    fn abandon(mut self) -> SessionOutcome {
        self.voice.stop();
        self.notifications.stop();
        let event = self.engine.abandon();
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
        SessionOutcome::Abandoned
    }
}
