//! Timer orchestration.
//!
//! [`PomodoroEngine`] is the only place that talks to both the [`Clock`] and
//! the [`RecoveryManager`]. It feeds clock output into the cycle state
//! machine, persists after every significant change and restores on
//! startup and whenever the context becomes visible again.
//!
//! ## Driving the engine
//!
//! The engine owns no thread. A front end calls [`PomodoroEngine::poll`]
//! about once a second and reports visibility changes:
//!
//! ```ignore
//! let mut engine = PomodoroEngine::new(recovery, settings, time);
//! engine.initialize();
//! engine.start(None, None);
//! // In a 1 Hz loop:
//! for event in engine.poll() { /* render */ }
//! ```
//!
//! Elapsed time is always recomputed from wall-clock timestamps on resume
//! paths. Tick counts only drive the display.

use std::sync::Arc;

use chrono::Duration;

use super::clock::{Clock, ClockListener};
use super::cycle::{self, CycleInfo};
use super::settings::TimerSettings;
use super::snapshot::{TimerMode, TimerSnapshot, TimerStatus};
use crate::collaborators::{NoTasks, Notifier, NullNotifier, SettingsSource, TaskDirectory};
use crate::events::{Event, RestoreTrigger};
use crate::recovery::{correct_drift, RecoveryManager, RecoveryTier, RestoreOutcome};
use crate::time::TimeSource;

/// Owned timer instance plus its collaborators.
pub struct PomodoroEngine {
    clock: Clock,
    core: EngineCore,
}

/// Everything the clock's callbacks need, split from the clock itself so the
/// two can be borrowed independently.
struct EngineCore {
    snapshot: TimerSnapshot,
    recovery: RecoveryManager,
    settings: Box<dyn SettingsSource>,
    notifier: Box<dyn Notifier>,
    tasks: Box<dyn TaskDirectory>,
    time: Arc<dyn TimeSource>,
    ticks_since_save: u32,
    /// Wall-clock remainder to restart the clock from after a tick that
    /// arrived too late.
    resync: Option<u32>,
    pending: Vec<Event>,
}

impl PomodoroEngine {
    /// Create an idle engine with the current default settings.
    ///
    /// Nothing is restored until [`initialize`](Self::initialize) runs.
    pub fn new(
        recovery: RecoveryManager,
        settings: Box<dyn SettingsSource>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let snapshot = TimerSnapshot::initial(&settings.current());
        Self {
            clock: Clock::new(Arc::clone(&time)),
            core: EngineCore {
                snapshot,
                recovery,
                settings,
                notifier: Box::new(NullNotifier),
                tasks: Box::new(NoTasks),
                time,
                ticks_since_save: 0,
                resync: None,
                pending: Vec::new(),
            },
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.core.notifier = notifier;
        self
    }

    pub fn with_tasks(mut self, tasks: Box<dyn TaskDirectory>) -> Self {
        self.core.tasks = tasks;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> &TimerSnapshot {
        &self.core.snapshot
    }

    pub fn status(&self) -> TimerStatus {
        self.core.snapshot.status()
    }

    pub fn settings(&self) -> TimerSettings {
        self.core.settings.current()
    }

    pub fn recovery(&self) -> &RecoveryManager {
        &self.core.recovery
    }

    pub fn is_ticking(&self) -> bool {
        self.clock.is_active()
    }

    /// Build a full state snapshot event.
    pub fn snapshot_event(&self) -> Event {
        let s = &self.core.snapshot;
        Event::StateSnapshot {
            status: s.status(),
            mode: s.mode,
            remaining_secs: s.remaining,
            duration_secs: s.duration,
            progress_pct: s.progress_percent(),
            current_cycle: s.current_cycle,
            total_cycles: s.total_cycles,
            task_id: s.current_task_id.clone(),
            at: self.core.time.now(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Pick up whatever a previous run of this context (or another context)
    /// left behind.
    ///
    /// A countdown that is still going resumes from its wall-clock
    /// remainder. One that ran out while nothing was ticking completes
    /// immediately. Without stored state the engine stays idle.
    pub fn initialize(&mut self) -> Vec<Event> {
        if let Some(outcome) = self.core.recovery.restore() {
            self.adopt(outcome, RestoreTrigger::Startup);
        }
        self.core.check_health();
        self.drain()
    }

    /// Fire a due clock tick, if any, and hand back every queued event.
    pub fn poll(&mut self) -> Vec<Event> {
        self.clock.advance(&mut self.core);
        if let Some(remaining) = self.core.resync.take() {
            self.resync(remaining);
        }
        self.drain()
    }

    /// Report a visibility change of the hosting context.
    ///
    /// Going hidden saves immediately. Becoming visible again while running
    /// re-derives the remainder from persisted timestamps, because the tick
    /// schedule may have been throttled or frozen in the meantime.
    pub fn set_visibility(&mut self, visible: bool) -> Vec<Event> {
        let was_visible = self.core.recovery.is_foreground();
        self.core.recovery.set_foreground(visible);

        if !visible {
            self.core.persist();
        } else if !was_visible && self.core.snapshot.is_running {
            self.reconcile();
        }
        self.drain()
    }

    /// Persist the current state, e.g. before the process exits.
    pub fn flush(&mut self) {
        self.core.persist();
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start the current interval, optionally tied to a task and with an
    /// explicit length in minutes.
    ///
    /// Ignored while already running. Starting while paused resumes.
    pub fn start(&mut self, task_id: Option<String>, duration_minutes: Option<u32>) -> Option<Event> {
        match self.core.snapshot.status() {
            TimerStatus::Running => {
                tracing::debug!("start ignored: already running");
                None
            }
            TimerStatus::Paused => {
                if task_id.is_some() {
                    self.core.snapshot.current_task_id = task_id;
                }
                self.resume()
            }
            TimerStatus::Idle => {
                let snap = &mut self.core.snapshot;
                if task_id.is_some() {
                    snap.current_task_id = task_id;
                }
                match duration_minutes {
                    Some(0) => tracing::debug!("ignoring zero-minute duration override"),
                    Some(minutes) => {
                        snap.duration = minutes.saturating_mul(60);
                        snap.remaining = snap.duration;
                    }
                    None => {}
                }
                if snap.remaining == 0 {
                    snap.remaining = snap.duration;
                }
                snap.mark_running(self.core.time.now());

                self.clock.start(self.core.snapshot.remaining, &mut self.core);
                self.core.persist();

                let snap = &self.core.snapshot;
                Some(Event::TimerStarted {
                    mode: snap.mode,
                    duration_secs: snap.duration,
                    remaining_secs: snap.remaining,
                    task_id: snap.current_task_id.clone(),
                    at: self.core.time.now(),
                })
            }
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.core.snapshot.is_running {
            tracing::debug!("pause ignored: not running");
            return None;
        }
        self.clock.pause();

        // Ticks may have been starved; trust the anchor instead.
        let now = self.core.time.now();
        let drift = correct_drift(&self.core.snapshot, now, now);
        if drift.expired {
            self.core.snapshot = drift.snapshot;
            self.clock.stop();
            return self.core.complete_interval(true);
        }

        self.core.snapshot.remaining = drift.snapshot.remaining;
        self.core.snapshot.mark_paused();
        self.core.persist();
        Some(Event::TimerPaused {
            remaining_secs: self.core.snapshot.remaining,
            at: self.core.time.now(),
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        if !self.core.snapshot.is_paused {
            tracing::debug!("resume ignored: not paused");
            return None;
        }
        let remaining = self.core.snapshot.remaining;
        self.core.snapshot.mark_running(self.core.time.now());
        self.clock.resume(remaining, &mut self.core);
        self.core.persist();
        Some(Event::TimerResumed {
            remaining_secs: self.core.snapshot.remaining,
            at: self.core.time.now(),
        })
    }

    /// Abandon the countdown. The interval goes back to its full length;
    /// task association and cycle counters are kept.
    pub fn stop(&mut self) -> Option<Event> {
        let snap = &self.core.snapshot;
        if snap.is_idle() && snap.remaining == snap.duration {
            return None;
        }
        self.clock.stop();
        let snap = &mut self.core.snapshot;
        snap.remaining = snap.duration;
        snap.mark_idle();
        self.core.persist();
        Some(Event::TimerStopped {
            mode: self.core.snapshot.mode,
            remaining_secs: self.core.snapshot.remaining,
            at: self.core.time.now(),
        })
    }

    /// Hard reset: back to cycle 1, no task, nothing persisted.
    pub fn reset(&mut self) -> Option<Event> {
        self.clock.stop();
        self.core.snapshot = TimerSnapshot::initial(&self.core.settings.current());
        self.core.ticks_since_save = 0;
        self.core.recovery.clear();
        Some(Event::TimerReset { at: self.core.time.now() })
    }

    pub fn set_mode(&mut self, mode: TimerMode) -> Option<Event> {
        let settings = self.core.settings.current();
        let next = cycle::set_mode(&self.core.snapshot, mode, &settings)?;
        self.clock.stop();
        self.core.snapshot = next;
        self.core.persist();
        Some(Event::ModeChanged {
            mode,
            duration_secs: self.core.snapshot.duration,
            at: self.core.time.now(),
        })
    }

    pub fn set_focus_duration(&mut self, minutes: u32) -> Option<Event> {
        let settings = self.core.settings.current();
        let next = cycle::set_focus_duration(&self.core.snapshot, minutes, &settings);
        self.apply_duration_change(next)
    }

    pub fn set_break_duration(&mut self, minutes: u32) -> Option<Event> {
        let settings = self.core.settings.current();
        let next = cycle::set_break_duration(&self.core.snapshot, minutes, &settings);
        self.apply_duration_change(next)
    }

    /// Store new settings. They apply from the next transition; the
    /// interval on the dial is left alone.
    pub fn update_settings(&mut self, settings: TimerSettings) -> Option<Event> {
        match self.core.settings.replace(settings) {
            Ok(()) => Some(Event::SettingsUpdated { at: self.core.time.now() }),
            Err(e) => {
                tracing::warn!(error = %e, "settings update rejected");
                None
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn apply_duration_change(&mut self, next: Option<TimerSnapshot>) -> Option<Event> {
        let Some(next) = next else {
            tracing::debug!("duration change ignored");
            return None;
        };
        let clamped = next.remaining != self.core.snapshot.remaining;
        self.core.snapshot = next;
        if clamped && self.core.snapshot.is_running {
            self.clock.stop();
            self.core.snapshot.mark_running(self.core.time.now());
            self.clock.resume(self.core.snapshot.remaining, &mut self.core);
        }
        self.core.persist();
        let snap = &self.core.snapshot;
        Some(Event::DurationChanged {
            mode: snap.mode,
            duration_secs: snap.duration,
            remaining_secs: snap.remaining,
            at: self.core.time.now(),
        })
    }

    /// Bring a running in-memory snapshot back in line with wall-clock time
    /// after a stretch where ticks may not have fired.
    fn reconcile(&mut self) {
        match self.core.recovery.restore() {
            Some(outcome) => self.adopt(outcome, RestoreTrigger::Visibility),
            None => {
                let now = self.core.time.now();
                let drift = correct_drift(&self.core.snapshot, now, now);
                let outcome = RestoreOutcome {
                    snapshot: drift.snapshot,
                    tier: RecoveryTier::Session,
                    written_by: self.core.recovery.origin_id().to_string(),
                    saved_at: now,
                    age_secs: 0,
                    elapsed_secs: drift.elapsed_secs,
                    expired_while_away: drift.expired,
                    anomaly: false,
                };
                self.apply_restored(outcome, RestoreTrigger::Visibility, None);
            }
        }
        self.core.check_health();
    }

    /// Restart the countdown from a wall-clock remainder after the tick
    /// schedule fell behind.
    fn resync(&mut self, remaining: u32) {
        tracing::debug!(remaining, "tick schedule fell behind wall clock");
        self.clock.stop();
        if remaining == 0 {
            self.core.snapshot.remaining = 0;
            self.core.snapshot.mark_idle();
            if let Some(event) = self.core.complete_interval(true) {
                self.core.pending.push(event);
            }
        } else {
            self.core.snapshot.mark_running(self.core.time.now());
            self.clock.resume(remaining, &mut self.core);
            self.core.persist();
        }
    }

    fn adopt(&mut self, outcome: RestoreOutcome, trigger: RestoreTrigger) {
        let tier = Some(outcome.tier);
        self.apply_restored(outcome, trigger, tier);
    }

    fn apply_restored(
        &mut self,
        outcome: RestoreOutcome,
        trigger: RestoreTrigger,
        tier: Option<RecoveryTier>,
    ) {
        self.clock.stop();
        self.core.snapshot = outcome.snapshot;
        self.core.pending.push(Event::Restored {
            trigger,
            tier,
            status: self.core.snapshot.status(),
            remaining_secs: self.core.snapshot.remaining,
            elapsed_secs: outcome.elapsed_secs,
            expired_while_away: outcome.expired_while_away,
            anomaly: outcome.anomaly,
            at: self.core.time.now(),
        });

        if outcome.expired_while_away {
            if let Some(event) = self.core.complete_interval(true) {
                self.core.pending.push(event);
            }
        } else if self.core.snapshot.is_running {
            self.clock.resume(self.core.snapshot.remaining, &mut self.core);
            self.core.persist();
        }
    }

    fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.core.pending)
    }
}

impl EngineCore {
    fn persist(&mut self) {
        debug_assert!(self.snapshot.is_consistent(), "{:?}", self.snapshot);
        self.recovery.save(&self.snapshot);
        self.ticks_since_save = 0;
    }

    /// Run the cycle transition for the interval that just ran out, notify
    /// and persist the idle result.
    fn complete_interval(&mut self, recovered: bool) -> Option<Event> {
        let settings = self.settings.current();
        let finished = self.snapshot.mode;
        let next = cycle::complete(&self.snapshot, &settings);
        let info = CycleInfo::of(&next, &settings);

        let title = next
            .current_task_id
            .as_deref()
            .and_then(|id| self.tasks.task_title(id));
        self.notifier
            .notify_interval_complete(finished, info, title.as_deref());
        if next.mode == TimerMode::LongBreak {
            self.notifier.notify_long_break_milestone(next.total_cycles);
        }

        self.snapshot = next;
        self.persist();
        Some(Event::IntervalCompleted {
            completed: finished,
            next: self.snapshot.mode,
            next_duration_secs: self.snapshot.duration,
            cycle: info,
            recovered,
            at: self.time.now(),
        })
    }

    fn check_health(&mut self) {
        let stats = self.recovery.stats();
        let threshold = self.recovery.config().health_threshold;
        if !stats.is_healthy(threshold) {
            tracing::warn!(
                ratio = stats.health_ratio(),
                successes = stats.successes,
                failures = stats.failures,
                "timer recovery is unreliable"
            );
            self.pending.push(Event::RecoveryDegraded {
                health_ratio: stats.health_ratio(),
                threshold,
                at: self.time.now(),
            });
        }
    }
}

impl ClockListener for EngineCore {
    fn on_tick(&mut self, remaining: u32) {
        let now = self.time.now();
        let mut shown = remaining.min(self.snapshot.duration);

        if self.snapshot.is_running {
            // Move the anchor by exactly the seconds the display consumed, so
            // `remaining - (now - anchor)` stays the true remainder even when
            // ticks arrive late.
            let consumed = self.snapshot.remaining.saturating_sub(shown);
            let anchor = self.snapshot.last_start_time.unwrap_or(now)
                + Duration::seconds(i64::from(consumed));
            let lag = (now - anchor).num_seconds();
            let tolerance = self.recovery.config().drift_tolerance_secs.max(0);

            if shown > 0 && lag > tolerance {
                let wall = (i64::from(shown) - lag).max(0);
                shown = u32::try_from(wall).unwrap_or(0);
                self.resync = Some(shown);
                self.snapshot.last_start_time = Some(now);
            } else {
                self.snapshot.last_start_time = Some(anchor.min(now));
            }
        }

        self.snapshot.remaining = shown;
        self.pending.push(Event::TimerTick {
            remaining_secs: shown,
            at: now,
        });

        self.ticks_since_save = self.ticks_since_save.saturating_add(1);
        if self.resync.is_none()
            && self.ticks_since_save >= self.recovery.config().persist_every_ticks.max(1)
        {
            self.persist();
        }
    }

    fn on_complete(&mut self) {
        if let Some(event) = self.complete_interval(false) {
            self.pending.push(event);
        }
    }
}
