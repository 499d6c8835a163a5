use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Subcommand;
use tickwise_core::recovery::{get_or_create_origin_id_at, SESSION_KEY_PREFIX};
use tickwise_core::storage::data_dir;
use tickwise_core::{
    Config, ConfigSettings, Database, Event, LogNotifier, PomodoroEngine, RecoveryManager,
    SystemTime, TimeSource, TimerMode,
};
use tokio::time::MissedTickBehavior;

/// Wake-up gap treated as the process having been suspended.
const SUSPEND_GAP_SECS: i64 = 3;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the current interval (resumes when paused)
    Start {
        /// Task to attach to the interval
        #[arg(long)]
        task: Option<String>,
        /// Interval length in minutes for this run only
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Pause the countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Abandon the countdown, keeping cycle progress
    Stop,
    /// Back to the first cycle, clearing all saved state
    Reset {
        /// Also drop session state left behind by every other origin
        #[arg(long)]
        all: bool,
    },
    /// Print current timer state as JSON
    Status,
    /// Switch to another mode (focus, short-break, long-break)
    Mode { mode: TimerMode },
    /// Set the focus length in minutes
    FocusDuration { minutes: u32 },
    /// Set the short-break length in minutes
    BreakDuration { minutes: u32 },
    /// Drive the timer in the foreground until interrupted
    Run {
        /// Start the current interval first if the timer is idle
        #[arg(long)]
        start: bool,
    },
    /// Print restore health statistics
    Health {
        /// Clear the statistics
        #[arg(long)]
        reset: bool,
    },
}

fn open_engine(origin: Option<String>) -> Result<(PomodoroEngine, Arc<Database>), Box<dyn Error>> {
    let dir = data_dir()?;
    let settings = ConfigSettings::open(Config::default_path()?)?;
    let config = settings.config();

    let origin = match origin.filter(|o| !o.trim().is_empty()) {
        Some(origin) => origin,
        None => get_or_create_origin_id_at(&dir)?,
    };
    tracing::debug!(%origin, "opening timer");

    // One file backs both tiers: a CLI invocation only lives for one command.
    let db = Arc::new(Database::open_at(&dir.join("tickwise.db"))?);
    let time: Arc<dyn TimeSource> = Arc::new(SystemTime);
    let recovery = RecoveryManager::with_config(
        Box::new(Arc::clone(&db)),
        Box::new(Arc::clone(&db)),
        origin,
        Arc::clone(&time),
        config.recovery.clone(),
    );
    let notifier = LogNotifier {
        enabled: config.notifications.enabled,
        milestones: config.notifications.long_break_milestones,
    };

    let engine =
        PomodoroEngine::new(recovery, Box::new(settings), time).with_notifier(Box::new(notifier));
    Ok((engine, db))
}

fn print_event(event: &Event) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(event)?);
    Ok(())
}

/// Print everything except ticks, which only matter to a live display.
fn print_events(events: &[Event]) -> Result<(), Box<dyn Error>> {
    for event in events {
        if !matches!(event, Event::TimerTick { .. }) {
            print_event(event)?;
        }
    }
    Ok(())
}

pub fn run(action: TimerAction, origin: Option<String>) -> Result<(), Box<dyn Error>> {
    let (mut engine, db) = open_engine(origin)?;

    match action {
        TimerAction::Health { reset } => return health(&engine, reset),
        TimerAction::Reset { all } => {
            if let Some(event) = engine.reset() {
                print_event(&event)?;
            }
            if all {
                let purged = purge_sessions(&db)?;
                tracing::info!(purged, "dropped session state of all origins");
            }
            return Ok(());
        }
        _ => {}
    }

    print_events(&engine.initialize())?;

    let event = match action {
        TimerAction::Start { task, minutes } => engine.start(task, minutes),
        TimerAction::Pause => engine.pause(),
        TimerAction::Resume => engine.resume(),
        TimerAction::Stop => engine.stop(),
        TimerAction::Mode { mode } => engine.set_mode(mode),
        TimerAction::FocusDuration { minutes } => engine.set_focus_duration(minutes),
        TimerAction::BreakDuration { minutes } => engine.set_break_duration(minutes),
        TimerAction::Status => None,
        TimerAction::Run { start } => {
            if start && engine.snapshot().is_idle() {
                if let Some(event) = engine.start(None, None) {
                    print_event(&event)?;
                }
            }
            return drive(&mut engine);
        }
        TimerAction::Reset { .. } | TimerAction::Health { .. } => None,
    };

    match event {
        Some(event) => print_event(&event)?,
        // Ignored command or plain status query: show where things stand.
        None => print_event(&engine.snapshot_event())?,
    }
    engine.flush();
    Ok(())
}

/// Delete every session-tier row, whichever origin wrote it.
fn purge_sessions(db: &Database) -> Result<usize, Box<dyn Error>> {
    let keys = db.kv_keys(SESSION_KEY_PREFIX)?;
    for key in &keys {
        db.kv_delete(key)?;
    }
    Ok(keys.len())
}

fn health(engine: &PomodoroEngine, reset: bool) -> Result<(), Box<dyn Error>> {
    let recovery = engine.recovery();
    if reset {
        recovery.reset_stats();
    }
    let stats = recovery.stats();
    let threshold = recovery.config().health_threshold;
    let report = serde_json::json!({
        "stats": stats,
        "healthRatio": stats.health_ratio(),
        "threshold": threshold,
        "healthy": stats.is_healthy(threshold),
        "originId": recovery.origin_id(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// 1 Hz foreground driver.
///
/// Wall-clock gaps between wake-ups mean the process was stopped or the
/// machine slept; they are reported as the context going hidden and visible
/// again so the engine re-derives its remainder.
fn drive(engine: &mut PomodoroEngine) -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_wake = Utc::now();
        tracing::info!(origin = engine.recovery().origin_id(), "timer driver running, ctrl-c to exit");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Utc::now();
                    let gap = (now - last_wake).num_seconds();
                    last_wake = now;

                    let mut events = Vec::new();
                    if gap > SUSPEND_GAP_SECS {
                        tracing::info!(gap_secs = gap, "wake-up gap detected, reconciling");
                        events.extend(engine.set_visibility(false));
                        events.extend(engine.set_visibility(true));
                    }
                    events.extend(engine.poll());
                    render(engine, &events)?;
                }
                _ = tokio::signal::ctrl_c() => {
                    eprintln!();
                    break;
                }
            }
        }

        engine.flush();
        tracing::info!("timer state saved");
        Ok::<(), Box<dyn Error>>(())
    })
}

fn render(engine: &PomodoroEngine, events: &[Event]) -> Result<(), Box<dyn Error>> {
    for event in events {
        match event {
            Event::TimerTick { remaining_secs, .. } => {
                let mode = engine.snapshot().mode;
                let mut err = std::io::stderr();
                write!(
                    err,
                    "\r{mode:<11} {:02}:{:02}",
                    remaining_secs / 60,
                    remaining_secs % 60
                )?;
                err.flush()?;
            }
            other => {
                eprintln!();
                println!("{}", serde_json::to_string(other)?);
            }
        }
    }
    Ok(())
}
