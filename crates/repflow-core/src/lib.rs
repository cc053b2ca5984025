//! # repflow Core Library
//!
//! This library provides the workout execution engine behind repflow, a
//! personal workout timer. Front-ends (the CLI, a GUI) stay thin layers over
//! the same core.
//!
//! ## Architecture
//!
//! - **Routine**: blocks of activities with repeat counts, loaded from TOML,
//!   plus a sequence generator that flattens them for previews
//! - **Workout Engine**: a wall-clock-based state machine that walks the
//!   routine, handles pause, skip and a postponed-activity queue
//! - **Completion triggers**: countdown for time-based activities, voice
//!   keywords or a manual action for reps-based ones
//! - **Notification sync**: mirrors the engine onto an external surface and
//!   can drive the countdown while the app is backgrounded
//! - **Storage**: SQLite workout history and TOML configuration
//!
//! ## Key Components
//!
//! - [`WorkoutEngine`]: Core execution state machine
//! - [`WorkoutSession`]: Async driver owning one run
//! - [`Database`]: Workout history persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod routine;
pub mod session;
pub mod storage;
pub mod workout;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, HistoryError, NotifyError, RoutineError, VoiceError};
pub use events::Event;
pub use notify::{LogSurface, NotificationPayload, NotificationSurface, NotificationSync};
pub use routine::{
    Activity, ActivityKind, Block, BlockKind, Measurement, MeasurementKind, Position, Routine,
    SequencedActivity,
};
pub use session::{SessionCommand, SessionOutcome, WorkoutSession};
pub use storage::{Config, Database, HistoryStore};
pub use workout::{
    ActivityOutcome, ActivityRecord, AdvanceToken, CompletedSession, CompletionTrigger, Cursor,
    KeywordMatcher, NoSpeech, SpeechRecognizer, TriggerMode, VoiceController, VoiceMessage,
    WorkoutEngine, WorkoutState,
};
