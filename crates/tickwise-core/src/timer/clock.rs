//! One-second countdown schedule.
//!
//! The clock owns no thread. Its owner calls [`Clock::advance`] from a 1 Hz
//! driver and the clock decides whether a tick is due. A driver that stalls
//! (suspended process, throttled background context) simply loses ticks: a
//! late `advance` fires a single tick, never a burst. Callers that need the
//! true remainder after a stall must re-derive it from wall-clock
//! timestamps and [`Clock::resume`] from there.
//!
//! The clock knows nothing about modes, cycles or persistence.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::time::TimeSource;

/// Receives the clock's output.
pub trait ClockListener {
    /// Remaining whole seconds, emitted once at start/resume and once per
    /// elapsed second after that, down to and including zero.
    fn on_tick(&mut self, remaining: u32);

    /// Emitted exactly once, right after the tick that reached zero.
    fn on_complete(&mut self);
}

pub struct Clock {
    time: Arc<dyn TimeSource>,
    remaining: u32,
    /// Instant the next tick becomes due. `None` while no schedule is live.
    next_due: Option<DateTime<Utc>>,
}

impl Clock {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            time,
            remaining: 0,
            next_due: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Start a fresh countdown, replacing any live schedule.
    ///
    /// A zero duration is ignored. Returns whether a schedule was armed.
    pub fn start(&mut self, duration_secs: u32, listener: &mut dyn ClockListener) -> bool {
        self.stop();
        self.arm(duration_secs, listener)
    }

    /// Cancel the schedule, keeping the remaining value.
    pub fn pause(&mut self) {
        self.next_due = None;
    }

    /// Continue counting down from `remaining_secs`.
    ///
    /// Ignored while a schedule is already live, so redundant resume
    /// commands cannot double-start the countdown.
    pub fn resume(&mut self, remaining_secs: u32, listener: &mut dyn ClockListener) -> bool {
        if self.is_active() {
            tracing::debug!("clock resume ignored: already running");
            return false;
        }
        self.arm(remaining_secs, listener)
    }

    /// Cancel the schedule and forget the countdown.
    pub fn stop(&mut self) {
        self.next_due = None;
        self.remaining = 0;
    }

    /// Fire the next tick if it is due. Returns whether a tick fired.
    pub fn advance(&mut self, listener: &mut dyn ClockListener) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        let now = self.time.now();
        if now < due {
            return false;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.next_due = None;
            listener.on_tick(0);
            listener.on_complete();
        } else {
            self.next_due = Some(now + Duration::seconds(1));
            listener.on_tick(self.remaining);
        }
        true
    }

    fn arm(&mut self, secs: u32, listener: &mut dyn ClockListener) -> bool {
        if secs == 0 {
            tracing::debug!("clock not armed: zero seconds requested");
            return false;
        }
        self.remaining = secs;
        self.next_due = Some(self.time.now() + Duration::seconds(1));
        listener.on_tick(secs);
        true
    }
}
