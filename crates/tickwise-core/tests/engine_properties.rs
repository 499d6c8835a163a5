//! Property-based tests for snapshot invariants under arbitrary command
//! sequences.

mod common;

use common::Harness;
use proptest::prelude::*;
use tickwise_core::{TimerMode, TimerStatus};

#[derive(Debug, Clone)]
enum Command {
    Start(Option<u32>),
    Pause,
    Resume,
    Stop,
    Reset,
    Wait(i64),
    Poll,
    Hide,
    Show,
    SetMode(TimerMode),
    FocusDuration(u32),
    BreakDuration(u32),
    Restart,
}

fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        prop::option::of(1u32..3).prop_map(Command::Start),
        Just(Command::Pause),
        Just(Command::Resume),
        Just(Command::Stop),
        Just(Command::Reset),
        (0i64..200).prop_map(Command::Wait),
        Just(Command::Poll),
        Just(Command::Hide),
        Just(Command::Show),
        prop_oneof![
            Just(TimerMode::Focus),
            Just(TimerMode::ShortBreak),
            Just(TimerMode::LongBreak)
        ]
        .prop_map(Command::SetMode),
        prop_oneof![Just(15u32), Just(25), Just(17)].prop_map(Command::FocusDuration),
        prop_oneof![Just(5u32), Just(10), Just(7)].prop_map(Command::BreakDuration),
        Just(Command::Restart),
    ]
}

proptest! {
    #[test]
    fn prop_snapshot_stays_consistent(commands in prop::collection::vec(command(), 1..60)) {
        let h = Harness::new();
        let (mut engine, notes) = h.engine("tab-p");
        let mut completions = common::count_completions(&engine.initialize());

        for cmd in commands {
            let events = match cmd {
                Command::Start(minutes) => engine.start(None, minutes).into_iter().collect(),
                Command::Pause => engine.pause().into_iter().collect(),
                Command::Resume => engine.resume().into_iter().collect(),
                Command::Stop => engine.stop().into_iter().collect(),
                Command::Reset => engine.reset().into_iter().collect(),
                Command::Wait(secs) => {
                    h.time.advance_secs(secs);
                    Vec::new()
                }
                Command::Poll => engine.poll(),
                Command::Hide => engine.set_visibility(false),
                Command::Show => engine.set_visibility(true),
                Command::SetMode(mode) => engine.set_mode(mode).into_iter().collect(),
                Command::FocusDuration(m) => engine.set_focus_duration(m).into_iter().collect(),
                Command::BreakDuration(m) => engine.set_break_duration(m).into_iter().collect(),
                Command::Restart => {
                    engine.flush();
                    let (fresh, _) = h.engine("tab-p");
                    engine = fresh;
                    engine.initialize()
                }
            };
            completions += common::count_completions(&events);

            let snap = engine.snapshot();
            prop_assert!(snap.remaining <= snap.duration, "{:?}", snap);
            prop_assert!(snap.duration > 0);
            prop_assert!(!(snap.is_running && snap.is_paused));
            prop_assert!(snap.current_cycle >= 1);
            prop_assert_eq!(engine.is_ticking(), snap.status() == TimerStatus::Running);
            if snap.status() != TimerStatus::Running {
                prop_assert!(snap.last_start_time.is_none());
            }
        }

        // Completions seen through the first engine's notifier never exceed
        // the completion events observed.
        prop_assert!(notes.completions() <= completions);
    }
}
