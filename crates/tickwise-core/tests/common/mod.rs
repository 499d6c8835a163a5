//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tickwise_core::{
    CycleInfo, Event, ManualTime, MemoryStore, Notifier, PomodoroEngine, RecoveryManager,
    SnapshotStore, StaticSettings, TimeSource, TimerMode, TimerSettings,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    Complete {
        mode: TimerMode,
        cycle: CycleInfo,
        task_title: Option<String>,
    },
    Milestone(u32),
}

/// Notifier that remembers every call.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub notes: Arc<Mutex<Vec<Note>>>,
}

impl RecordingNotifier {
    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().unwrap().clone()
    }

    pub fn completions(&self) -> usize {
        self.notes()
            .iter()
            .filter(|n| matches!(n, Note::Complete { .. }))
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_interval_complete(&self, mode: TimerMode, cycle: CycleInfo, task_title: Option<&str>) {
        self.notes.lock().unwrap().push(Note::Complete {
            mode,
            cycle,
            task_title: task_title.map(str::to_string),
        });
    }

    fn notify_long_break_milestone(&self, total_cycles: u32) {
        self.notes.lock().unwrap().push(Note::Milestone(total_cycles));
    }
}

/// Stores and clock shared by every engine built from one harness, the way
/// contexts on one machine share storage.
pub struct Harness {
    pub session: Arc<MemoryStore>,
    pub durable: Arc<MemoryStore>,
    pub time: ManualTime,
    pub settings: TimerSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(TimerSettings::default())
    }

    pub fn with_settings(settings: TimerSettings) -> Self {
        Self {
            session: Arc::new(MemoryStore::new()),
            durable: Arc::new(MemoryStore::new()),
            time: ManualTime::starting_now(),
            settings,
        }
    }

    pub fn manager(&self, origin: &str) -> RecoveryManager {
        let time: Arc<dyn TimeSource> = Arc::new(self.time.clone());
        RecoveryManager::new(
            Box::new(Arc::clone(&self.session)) as Box<dyn SnapshotStore>,
            Box::new(Arc::clone(&self.durable)),
            origin,
            time,
        )
    }

    pub fn engine(&self, origin: &str) -> (PomodoroEngine, RecordingNotifier) {
        let notifier = RecordingNotifier::default();
        let engine = PomodoroEngine::new(
            self.manager(origin),
            Box::new(StaticSettings::new(self.settings.clone())),
            Arc::new(self.time.clone()),
        )
        .with_notifier(Box::new(notifier.clone()));
        (engine, notifier)
    }
}

/// Tick one second at a time until the running interval completes.
pub fn run_to_completion(engine: &mut PomodoroEngine, time: &ManualTime) -> Vec<Event> {
    let mut seen = Vec::new();
    for _ in 0..(24 * 60 * 60) {
        time.advance_secs(1);
        let events = engine.poll();
        let done = events
            .iter()
            .any(|e| matches!(e, Event::IntervalCompleted { .. }));
        seen.extend(events);
        if done {
            return seen;
        }
    }
    panic!("interval never completed");
}

pub fn count_completions(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::IntervalCompleted { .. }))
        .count()
}
