mod config;
pub mod database;

pub use config::{Config, ConfigSettings, NotificationsConfig, ScheduleConfig};
pub use database::Database;

use std::path::PathBuf;

use crate::error::CoreError;

/// Returns `~/.config/tickwise[-dev]/` based on TICKWISE_ENV.
///
/// Set TICKWISE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TICKWISE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("tickwise-dev")
    } else {
        base_dir.join("tickwise")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
