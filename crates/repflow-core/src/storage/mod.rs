mod config;
pub mod database;

pub use config::{Config, EngineConfig, NotificationsConfig, VoiceConfig};
pub use database::{Database, HistoryStats, HistoryStore, SessionSummary};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/repflow[-dev]/` based on REPFLOW_ENV.
///
/// Set REPFLOW_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("REPFLOW_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("repflow-dev")
    } else {
        base_dir.join("repflow")
    };

    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
