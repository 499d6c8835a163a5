use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::settings::TimerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerMode {
    Focus,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Focus => "focus",
            TimerMode::ShortBreak => "short-break",
            TimerMode::LongBreak => "long-break",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "focus" => Ok(TimerMode::Focus),
            "short-break" | "short" => Ok(TimerMode::ShortBreak),
            "long-break" | "long" => Ok(TimerMode::LongBreak),
            other => Err(format!(
                "unknown mode '{other}' (expected focus, short-break or long-break)"
            )),
        }
    }
}

/// Which of the three mutually exclusive run states a snapshot is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

/// The authoritative state of one timer instance.
///
/// `remaining` is measured at `last_start_time` while running: whoever
/// lowers `remaining` from a tick also moves `last_start_time` forward by the
/// same number of seconds, so `remaining - (now - last_start_time)` is always
/// the true wall-clock remainder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    /// Planned seconds for the current interval.
    pub duration: u32,
    pub remaining: u32,
    pub is_running: bool,
    pub is_paused: bool,
    pub current_cycle: u32,
    pub total_cycles: u32,
    #[serde(default)]
    pub current_task_id: Option<String>,
    #[serde(default)]
    pub last_start_time: Option<DateTime<Utc>>,
}

impl TimerSnapshot {
    /// Fresh idle focus interval.
    pub fn initial(settings: &TimerSettings) -> Self {
        let duration = settings.duration_secs(TimerMode::Focus);
        Self {
            mode: TimerMode::Focus,
            duration,
            remaining: duration,
            is_running: false,
            is_paused: false,
            current_cycle: 1,
            total_cycles: 0,
            current_task_id: None,
            last_start_time: None,
        }
    }

    pub fn status(&self) -> TimerStatus {
        match (self.is_running, self.is_paused) {
            (true, _) => TimerStatus::Running,
            (false, true) => TimerStatus::Paused,
            (false, false) => TimerStatus::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status() == TimerStatus::Idle
    }

    pub fn mark_running(&mut self, at: DateTime<Utc>) {
        self.is_running = true;
        self.is_paused = false;
        self.last_start_time = Some(at);
    }

    pub fn mark_paused(&mut self) {
        self.is_running = false;
        self.is_paused = true;
        self.last_start_time = None;
    }

    pub fn mark_idle(&mut self) {
        self.is_running = false;
        self.is_paused = false;
        self.last_start_time = None;
    }

    /// Whether every documented invariant holds.
    pub fn is_consistent(&self) -> bool {
        self.duration > 0
            && self.remaining <= self.duration
            && !(self.is_running && self.is_paused)
            && self.current_cycle >= 1
            && (self.is_running || self.last_start_time.is_none())
    }

    /// 0..=100 progress through the current interval.
    pub fn progress_percent(&self) -> f64 {
        progress_percent(i64::from(self.duration), i64::from(self.remaining))
    }
}

/// Percentage of `duration` already consumed.
///
/// Clamped to `0.0..=100.0`: a `remaining` above `duration` reads as no
/// progress, a negative `remaining` as done. A non-positive `duration` has no
/// meaningful progress and yields 0.
pub fn progress_percent(duration: i64, remaining: i64) -> f64 {
    if duration <= 0 {
        return 0.0;
    }
    let elapsed = duration.saturating_sub(remaining) as f64;
    (elapsed / duration as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_snapshot_is_idle_focus() {
        let snap = TimerSnapshot::initial(&TimerSettings::default());
        assert_eq!(snap.mode, TimerMode::Focus);
        assert_eq!(snap.remaining, snap.duration);
        assert_eq!(snap.status(), TimerStatus::Idle);
        assert_eq!(snap.current_cycle, 1);
        assert_eq!(snap.total_cycles, 0);
        assert!(snap.is_consistent());
    }

    #[test]
    fn progress_values() {
        assert_eq!(progress_percent(100, 75), 25.0);
        assert_eq!(progress_percent(100, 150), 0.0);
        assert_eq!(progress_percent(100, -10), 100.0);
        assert_eq!(progress_percent(0, 0), 0.0);
    }

    #[test]
    fn mode_parses_loose_spellings() {
        assert_eq!("focus".parse::<TimerMode>(), Ok(TimerMode::Focus));
        assert_eq!("Short_Break".parse::<TimerMode>(), Ok(TimerMode::ShortBreak));
        assert_eq!("long".parse::<TimerMode>(), Ok(TimerMode::LongBreak));
        assert!("nap".parse::<TimerMode>().is_err());
    }

    #[test]
    fn serializes_camel_case_with_kebab_mode() {
        let snap = TimerSnapshot::initial(&TimerSettings::default());
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["mode"], "focus");
        assert_eq!(json["isRunning"], false);
        assert_eq!(json["currentCycle"], 1);
    }

    #[test]
    fn state_marks_are_exclusive() {
        let mut snap = TimerSnapshot::initial(&TimerSettings::default());
        snap.mark_running(Utc::now());
        assert_eq!(snap.status(), TimerStatus::Running);
        snap.mark_paused();
        assert_eq!(snap.status(), TimerStatus::Paused);
        assert!(snap.last_start_time.is_none());
        snap.mark_idle();
        assert!(snap.is_idle());
    }
}
