use std::sync::Arc;
use std::time::Duration;

use axis_core::mocks::ManualChannel;
use axis_core::{Harness, HarnessError, Interrupt, MemorySink};
use axis_traits::PvValue;
use axis_traits::clock::test_clock::TestClock;
use rstest::rstest;

const P: &str = "TST:M1:";

#[derive(Debug, Clone, Copy)]
enum Target {
    Move,
    State,
}

fn harness(manual: &ManualChannel, clock: &TestClock) -> Harness {
    Harness::builder()
        .with_channel(Arc::new(manual.clone()))
        .with_prefix(P)
        .with_clock(Arc::new(clock.clone()))
        .with_sink(Box::new(MemorySink::new()))
        .build()
        .unwrap()
}

fn interrupt(h: &mut Harness, target: Target) -> axis_core::Result<()> {
    match target {
        Target::Move => h.interrupt_move(2.0, 1.0, Interrupt::Halt),
        Target::State => h.interrupt_state(3, Interrupt::Halt),
    }
}

// Defaults: move waits `busy_lead` (300) then up to `busy` (4000);
// state waits up to `state_busy` (7000) with no lead.
#[rstest]
#[case::move_interrupt(Target::Move, 4000, 4300)]
#[case::state_interrupt(Target::State, 7000, 7000)]
fn never_busy_uses_the_busy_window_of_the_target(
    #[case] target: Target,
    #[case] timeout_ms: u64,
    #[case] elapsed_ms: u64,
) {
    let manual = ManualChannel::new();
    let clock = TestClock::new();
    let mut h = harness(&manual, &clock);

    let err = interrupt(&mut h, target).unwrap_err();
    assert_eq!(
        err.downcast_ref::<HarnessError>(),
        Some(&HarnessError::NeverBusy { timeout_ms })
    );
    assert_eq!(clock.offset(), Duration::from_millis(elapsed_ms));
    assert!(!manual.writes().iter().any(|(n, _)| n.ends_with("bHalt")));
}

// Time before the pulse: move sleeps `busy_lead` (300), a state move dwells
// `state_dwell` (600) after busy. Then the pulse hold (250) and the
// `interrupt_done` window (10000) since done never rises here.
#[rstest]
#[case::move_interrupt(Target::Move, 300)]
#[case::state_interrupt(Target::State, 600)]
fn pulse_follows_busy_after_the_target_delay(#[case] target: Target, #[case] before_pulse_ms: u64) {
    let manual = ManualChannel::new();
    manual.set(&format!("{P}bBusy_RBV"), PvValue::Bool(true));
    let clock = TestClock::new();
    let mut h = harness(&manual, &clock);

    let err = interrupt(&mut h, target).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HarnessError>(),
        Some(HarnessError::WaitTimeout { .. })
    ));
    assert_eq!(
        clock.offset(),
        Duration::from_millis(before_pulse_ms + 250 + 10_000)
    );
    let writes: Vec<String> = manual
        .writes()
        .into_iter()
        .map(|(n, _)| n.trim_start_matches(P).to_string())
        .collect();
    assert_eq!(&writes[writes.len() - 2..], ["bHalt", "bHalt"]);
}
