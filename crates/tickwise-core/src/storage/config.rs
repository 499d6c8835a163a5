//! TOML-based application configuration.
//!
//! Stores:
//! - Interval lengths and the long-break cadence
//! - Persistence and recovery tunables
//! - Notification preferences
//!
//! Configuration is stored at `~/.config/tickwise/config.toml`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::collaborators::SettingsSource;
use crate::error::{ConfigError, CoreError};
use crate::recovery::RecoveryConfig;
use crate::timer::TimerSettings;

/// Schedule-specific configuration. Durations are minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_focus_duration")]
    pub focus_duration: u32,
    #[serde(default = "default_short_break")]
    pub short_break: u32,
    #[serde(default = "default_long_break")]
    pub long_break: u32,
    #[serde(default = "default_cycles_before_long_break")]
    pub cycles_before_long_break: u32,
    #[serde(default = "default_focus_options")]
    pub focus_options: Vec<u32>,
    #[serde(default = "default_short_break_options")]
    pub short_break_options: Vec<u32>,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Announce every long break as a milestone.
    #[serde(default = "default_true")]
    pub long_break_milestones: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/tickwise/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_focus_duration() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_cycles_before_long_break() -> u32 {
    4
}
fn default_focus_options() -> Vec<u32> {
    TimerSettings::default().focus_options
}
fn default_short_break_options() -> Vec<u32> {
    TimerSettings::default().short_break_options
}
fn default_true() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            focus_duration: default_focus_duration(),
            short_break: default_short_break(),
            long_break: default_long_break(),
            cycles_before_long_break: default_cycles_before_long_break(),
            focus_options: default_focus_options(),
            short_break_options: default_short_break_options(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            long_break_milestones: true,
        }
    }
}

impl ScheduleConfig {
    pub fn to_settings(&self) -> TimerSettings {
        TimerSettings {
            focus_options: self.focus_options.clone(),
            short_break_options: self.short_break_options.clone(),
            focus_minutes: self.focus_duration,
            short_break_minutes: self.short_break,
            long_break_minutes: self.long_break,
            cycles_before_long_break: self.cycles_before_long_break,
        }
    }

    pub fn apply_settings(&mut self, settings: &TimerSettings) {
        self.focus_options = settings.focus_options.clone();
        self.short_break_options = settings.short_break_options.clone();
        self.focus_duration = settings.focus_minutes;
        self.short_break = settings.short_break_minutes;
        self.long_break = settings.long_break_minutes;
        self.cycles_before_long_break = settings.cycles_before_long_break;
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn default_path() -> Result<PathBuf, CoreError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default path, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, CoreError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    /// Any other read failure is returned and the file is left alone.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the default path.
    pub fn save(&self) -> Result<(), CoreError> {
        self.save_to(&Self::default_path()?)
    }

    /// Persist to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), CoreError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting schedule is inconsistent.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save to the default path.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        self.set_value(key, value)?;
        self.save()
    }

    pub fn timer_settings(&self) -> TimerSettings {
        self.schedule.to_settings()
    }

    /// Reject configurations the engine could not run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.timer_settings().validate()?;
        let r = &self.recovery;
        if r.session_ttl_secs <= 0 || r.durable_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "recovery".into(),
                message: "TTLs must be positive".into(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&r.health_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "recovery.health_threshold".into(),
                message: "must be between 0 and 1".into(),
            }
            .into());
        }
        Ok(())
    }
}

/// Timer settings read from a config file on every access, so an edit made
/// by another process takes effect at the next mode transition.
pub struct ConfigSettings {
    path: PathBuf,
    last_good: Mutex<Config>,
}

impl ConfigSettings {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let config = Config::load_from(&path)?;
        Ok(Self {
            path,
            last_good: Mutex::new(config),
        })
    }

    pub fn config(&self) -> Config {
        self.refresh()
    }

    fn refresh(&self) -> Config {
        let mut guard = match self.last_good.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match std::fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|raw| toml::from_str::<Config>(&raw).map_err(|e| e.to_string()))
        {
            Ok(cfg) if cfg.validate().is_ok() => *guard = cfg,
            Ok(_) => tracing::warn!(path = %self.path.display(), "ignoring invalid config"),
            Err(e) => tracing::debug!(path = %self.path.display(), error = %e, "config unreadable, keeping last good copy"),
        }
        guard.clone()
    }
}

impl SettingsSource for ConfigSettings {
    fn current(&self) -> TimerSettings {
        self.refresh().timer_settings()
    }

    fn replace(&self, settings: TimerSettings) -> Result<(), CoreError> {
        settings.validate()?;
        let mut config = self.refresh();
        config.schedule.apply_settings(&settings);
        config.save_to(&self.path)?;
        if let Ok(mut guard) = self.last_good.lock() {
            *guard = config;
        }
        Ok(())
    }
}
