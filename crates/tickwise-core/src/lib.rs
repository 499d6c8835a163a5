//! # Tickwise Core Library
//!
//! Core logic for the Tickwise Pomodoro timer: a focus/break cycle engine
//! whose countdown survives restarts, suspension and duplicated contexts.
//! Every operation is reachable from the standalone CLI binary, which is a
//! thin driver over this library.
//!
//! ## Architecture
//!
//! - **Timer**: a caller-driven one-second [`Clock`], pure cycle transitions
//!   and the [`PomodoroEngine`] that ties them together
//! - **Recovery**: two-tier snapshot persistence with wall-clock drift
//!   correction and restore health statistics
//! - **Storage**: SQLite key-value storage and TOML configuration
//!
//! ## Key Components
//!
//! - [`PomodoroEngine`]: timer state machine and command surface
//! - [`RecoveryManager`]: save/restore across the session and durable tiers
//! - [`Database`]: durable key-value persistence
//! - [`Config`]: application configuration management

pub mod collaborators;
pub mod error;
pub mod events;
pub mod recovery;
pub mod storage;
pub mod time;
pub mod timer;

pub use collaborators::{
    LogNotifier, NoTasks, Notifier, NullNotifier, SettingsSource, StaticSettings, TaskDirectory,
    TaskTitles,
};
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::{Event, RestoreTrigger};
pub use recovery::{
    MemoryStore, RecoveryConfig, RecoveryManager, RecoveryStats, RecoveryTier, RestoreOutcome,
    SnapshotStore,
};
pub use storage::{Config, ConfigSettings, Database};
pub use time::{ManualTime, SystemTime, TimeSource};
pub use timer::{
    Clock, ClockListener, CycleInfo, PomodoroEngine, TimerMode, TimerSettings, TimerSnapshot,
    TimerStatus,
};
