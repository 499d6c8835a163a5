pub mod clock;
pub mod cycle;
mod engine;
mod settings;
mod snapshot;

pub use clock::{Clock, ClockListener};
pub use cycle::CycleInfo;
pub use engine::PomodoroEngine;
pub use settings::TimerSettings;
pub use snapshot::{progress_percent, TimerMode, TimerSnapshot, TimerStatus};
