//! Focus/break cycle transitions.
//!
//! Everything here is a pure function of a snapshot and the settings in force
//! at the moment of the call. None of it starts a countdown: a completed
//! interval always lands idle and the caller decides when to run the next.

use serde::{Deserialize, Serialize};

use super::settings::TimerSettings;
use super::snapshot::{TimerMode, TimerSnapshot};

/// Cycle position reported alongside interval notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleInfo {
    pub current_cycle: u32,
    pub total_cycles: u32,
    pub cycles_before_long_break: u32,
}

impl CycleInfo {
    pub fn of(snapshot: &TimerSnapshot, settings: &TimerSettings) -> Self {
        Self {
            current_cycle: snapshot.current_cycle,
            total_cycles: snapshot.total_cycles,
            cycles_before_long_break: settings.cycles_before_long_break,
        }
    }
}

/// Next snapshot after the current interval ran out.
///
/// Focus completion counts the cycle and picks a long break on every
/// `cycles_before_long_break`-th completion; a short break advances
/// `current_cycle`; a long break starts the period over at cycle 1.
pub fn complete(snapshot: &TimerSnapshot, settings: &TimerSettings) -> TimerSnapshot {
    let mut next = snapshot.clone();
    match snapshot.mode {
        TimerMode::Focus => {
            next.total_cycles = snapshot.total_cycles.saturating_add(1);
            let every = settings.cycles_before_long_break.max(1);
            next.mode = if next.total_cycles % every == 0 {
                TimerMode::LongBreak
            } else {
                TimerMode::ShortBreak
            };
        }
        TimerMode::ShortBreak => {
            next.mode = TimerMode::Focus;
            next.current_cycle = snapshot.current_cycle.saturating_add(1);
        }
        TimerMode::LongBreak => {
            next.mode = TimerMode::Focus;
            next.current_cycle = 1;
        }
    }
    next.duration = settings.duration_secs(next.mode);
    next.remaining = next.duration;
    next.mark_idle();
    next
}

/// Switch to `mode` with its configured duration, idle.
///
/// Returns `None` when the snapshot is already idle in that mode.
pub fn set_mode(
    snapshot: &TimerSnapshot,
    mode: TimerMode,
    settings: &TimerSettings,
) -> Option<TimerSnapshot> {
    if snapshot.mode == mode && snapshot.is_idle() {
        return None;
    }
    let mut next = snapshot.clone();
    next.mode = mode;
    next.duration = settings.duration_secs(mode);
    next.remaining = next.duration;
    next.mark_idle();
    Some(next)
}

/// Change the focus length shown on the dial.
///
/// Ignored unless the snapshot is in focus mode and `minutes` is one of the
/// allowed focus options.
pub fn set_focus_duration(
    snapshot: &TimerSnapshot,
    minutes: u32,
    settings: &TimerSettings,
) -> Option<TimerSnapshot> {
    if snapshot.mode != TimerMode::Focus || !settings.allows_focus(minutes) {
        return None;
    }
    Some(apply_duration(snapshot, minutes))
}

/// Change the short-break length shown on the dial.
///
/// Ignored unless the snapshot is in short-break mode and `minutes` is one of
/// the allowed short-break options.
pub fn set_break_duration(
    snapshot: &TimerSnapshot,
    minutes: u32,
    settings: &TimerSettings,
) -> Option<TimerSnapshot> {
    if snapshot.mode != TimerMode::ShortBreak || !settings.allows_short_break(minutes) {
        return None;
    }
    Some(apply_duration(snapshot, minutes))
}

/// Idle snapshots take the new length immediately. A countdown in progress
/// keeps its remainder; it is only pulled down if it would otherwise exceed
/// the shortened duration.
fn apply_duration(snapshot: &TimerSnapshot, minutes: u32) -> TimerSnapshot {
    let mut next = snapshot.clone();
    next.duration = minutes.saturating_mul(60).max(1);
    if next.is_idle() {
        next.remaining = next.duration;
    } else {
        next.remaining = next.remaining.min(next.duration);
    }
    next
}
