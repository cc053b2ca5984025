//! Core error types for repflow-core.
//!
//! Every fallible seam of the library has its own `thiserror` enum; they all
//! fold into [`CoreError`] so callers can use a single `?` chain.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for repflow-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Routine definition errors (caught before a run begins)
    #[error("Routine error: {0}")]
    Routine(#[from] RoutineError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// History store errors
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Voice recognition errors
    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    /// Notification surface errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Routine definition errors.
#[derive(Error, Debug)]
pub enum RoutineError {
    /// A block without activities cannot be executed.
    #[error("Invalid routine: block {block_index} ('{block_name}') has no activities")]
    EmptyBlock {
        block_index: usize,
        block_name: String,
    },

    /// The routine has no blocks at all.
    #[error("Invalid routine: '{0}' has no blocks")]
    NoBlocks(String),

    /// Block repetitions must be at least one.
    #[error("Invalid routine: block {block_index} ('{block_name}') has zero repetitions")]
    ZeroRepetitions {
        block_index: usize,
        block_name: String,
    },

    /// A time-based activity needs a positive duration, a reps-based one a positive count.
    #[error("Invalid routine: activity '{activity}' in block {block_index} has a zero {unit}")]
    ZeroMeasurement {
        block_index: usize,
        activity: String,
        unit: &'static str,
    },

    /// A start index past the end of the expanded sequence.
    #[error("Start index {index} is out of range: the routine has {len} entries")]
    StartOutOfRange { index: usize, len: usize },

    /// Failed to read the routine file.
    #[error("Failed to read routine from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the routine file.
    #[error("Failed to parse routine: {0}")]
    ParseFailed(#[from] toml::de::Error),
}

impl RoutineError {
    /// Whether this is a precondition violation of the routine shape
    /// (as opposed to an IO/parse failure).
    pub fn is_invalid_routine(&self) -> bool {
        matches!(
            self,
            RoutineError::EmptyBlock { .. }
                | RoutineError::NoBlocks(_)
                | RoutineError::ZeroRepetitions { .. }
                | RoutineError::ZeroMeasurement { .. }
        )
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Data directory could not be determined or created
    #[error("Failed to prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown configuration key
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// History store errors.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Failed to open database connection
    #[error("Failed to open history database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(#[from] rusqlite::Error),

    /// Stored row could not be decoded
    #[error("Corrupt history row: {0}")]
    Corrupt(String),

    /// Data directory unavailable
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Voice recognition errors. Never fatal to a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    #[error("speech recognition is not available on this platform")]
    Unavailable,

    #[error("microphone or speech permission denied")]
    PermissionDenied,

    #[error("speech platform error: {0}")]
    Platform(String),
}

/// Notification surface errors. Never fatal to a run.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification surface unavailable: {0}")]
    Unavailable(String),

    #[error("notification update failed: {0}")]
    UpdateFailed(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
