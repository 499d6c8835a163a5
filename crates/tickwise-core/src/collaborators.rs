//! Seams to the systems the engine does not own.
//!
//! Settings belong to user preferences, tasks to the task store, and
//! notification delivery to whatever front end is attached. The engine only
//! talks to them through these traits.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::CoreError;
use crate::timer::{CycleInfo, TimerMode, TimerSettings};

/// Where timer settings come from.
///
/// Read at every transition that needs a duration and never cached by the
/// engine, so edits apply from the next transition onward.
pub trait SettingsSource {
    fn current(&self) -> TimerSettings;

    /// Replace the stored settings.
    ///
    /// # Errors
    /// Returns an error if the settings are invalid or cannot be stored.
    fn replace(&self, settings: TimerSettings) -> Result<(), CoreError>;
}

/// Receives interval notifications. Delivery is fire-and-forget: failures
/// stay inside the implementation.
pub trait Notifier {
    fn notify_interval_complete(&self, mode: TimerMode, cycle: CycleInfo, task_title: Option<&str>);

    fn notify_long_break_milestone(&self, total_cycles: u32);
}

/// Resolves an opaque task id to something presentable.
pub trait TaskDirectory {
    fn task_title(&self, task_id: &str) -> Option<String>;
}

/// Settings held in memory.
#[derive(Debug, Default)]
pub struct StaticSettings {
    settings: Mutex<TimerSettings>,
}

impl StaticSettings {
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsSource for StaticSettings {
    fn current(&self) -> TimerSettings {
        match self.settings.lock() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, settings: TimerSettings) -> Result<(), CoreError> {
        settings.validate()?;
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| CoreError::Custom("settings lock poisoned".into()))?;
        *guard = settings;
        Ok(())
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    pub enabled: bool,
    pub milestones: bool,
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self {
            enabled: true,
            milestones: true,
        }
    }
}

impl Notifier for LogNotifier {
    fn notify_interval_complete(&self, mode: TimerMode, cycle: CycleInfo, task_title: Option<&str>) {
        if !self.enabled {
            return;
        }
        match mode {
            TimerMode::Focus => tracing::info!(
                cycle = cycle.current_cycle,
                total = cycle.total_cycles,
                task = task_title.unwrap_or("-"),
                "focus interval complete, time for a break"
            ),
            TimerMode::ShortBreak | TimerMode::LongBreak => tracing::info!(
                %mode,
                cycle = cycle.current_cycle,
                "break over, ready to focus"
            ),
        }
    }

    fn notify_long_break_milestone(&self, total_cycles: u32) {
        if self.enabled && self.milestones {
            tracing::info!(total_cycles, "long break earned");
        }
    }
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify_interval_complete(&self, _: TimerMode, _: CycleInfo, _: Option<&str>) {}

    fn notify_long_break_milestone(&self, _: u32) {}
}

/// Knows no tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTasks;

impl TaskDirectory for NoTasks {
    fn task_title(&self, _: &str) -> Option<String> {
        None
    }
}

/// Fixed id → title table.
#[derive(Debug, Clone, Default)]
pub struct TaskTitles(pub HashMap<String, String>);

impl TaskDirectory for TaskTitles {
    fn task_title(&self, task_id: &str) -> Option<String> {
        self.0.get(task_id).cloned()
    }
}
