use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recovery::RecoveryTier;
use crate::timer::{CycleInfo, TimerMode, TimerStatus};

/// What prompted a restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreTrigger {
    Startup,
    Visibility,
}

/// Every state change in the engine produces an Event.
/// Front ends poll for events; command methods return the event they caused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        mode: TimerMode,
        duration_secs: u32,
        remaining_secs: u32,
        task_id: Option<String>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    /// Countdown abandoned; the interval is back at its full length.
    TimerStopped {
        mode: TimerMode,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    /// Hard reset: cycles, task association and persisted state cleared.
    TimerReset {
        at: DateTime<Utc>,
    },
    TimerTick {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    IntervalCompleted {
        completed: TimerMode,
        next: TimerMode,
        next_duration_secs: u32,
        cycle: CycleInfo,
        /// Completion was detected from persisted timestamps rather than
        /// by the clock reaching zero.
        recovered: bool,
        at: DateTime<Utc>,
    },
    ModeChanged {
        mode: TimerMode,
        duration_secs: u32,
        at: DateTime<Utc>,
    },
    DurationChanged {
        mode: TimerMode,
        duration_secs: u32,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    SettingsUpdated {
        at: DateTime<Utc>,
    },
    Restored {
        trigger: RestoreTrigger,
        /// `None` when no tier had anything and the in-memory snapshot was
        /// corrected from its own timestamps.
        tier: Option<RecoveryTier>,
        status: TimerStatus,
        remaining_secs: u32,
        elapsed_secs: i64,
        expired_while_away: bool,
        anomaly: bool,
        at: DateTime<Utc>,
    },
    /// Restore health ratio dropped below the configured threshold.
    RecoveryDegraded {
        health_ratio: f64,
        threshold: f64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TimerStatus,
        mode: TimerMode,
        remaining_secs: u32,
        duration_secs: u32,
        progress_pct: f64,
        current_cycle: u32,
        total_cycles: u32,
        task_id: Option<String>,
        at: DateTime<Utc>,
    },
}
