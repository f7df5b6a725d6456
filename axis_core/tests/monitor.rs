use std::sync::Arc;
use std::time::Duration;

use axis_core::mocks::ManualChannel;
use axis_core::{CompletionMonitor, HarnessError, MonitorRegistry, MonitorState, Predicate};
use axis_traits::clock::test_clock::TestClock;
use axis_traits::{Channel, PvValue};

const DONE: &str = "TST:M1:bDone_RBV";
const T: Duration = Duration::from_millis(100);
const POLL: Duration = Duration::from_millis(10);

fn setup() -> (ManualChannel, Arc<dyn Channel>, Arc<MonitorRegistry>) {
    let manual = ManualChannel::new();
    let channel: Arc<dyn Channel> = Arc::new(manual.clone());
    (manual, channel, Arc::new(MonitorRegistry::new()))
}

#[test]
fn rising_edge_ignores_value_already_set() {
    let (manual, channel, registry) = setup();
    manual.set(DONE, PvValue::Bool(true));
    let h = channel.connect(DONE).unwrap();
    let m = CompletionMonitor::arm(&channel, &registry, h, Predicate::RisingEdge, T).unwrap();

    // Repeated "still set" notifications are not an edge.
    manual.fire(DONE, PvValue::Bool(true));
    assert_eq!(m.state(), MonitorState::Armed);

    manual.fire(DONE, PvValue::Bool(false));
    assert!(!m.is_satisfied());
    manual.fire(DONE, PvValue::Bool(true));
    assert_eq!(m.state(), MonitorState::Satisfied);

    let outcome = m.wait(&TestClock::new(), T, POLL);
    assert!(outcome.satisfied);
    assert_eq!(outcome.series.len(), 3);
}

#[test]
fn level_match_is_satisfied_at_arm_time() {
    let (manual, channel, registry) = setup();
    manual.set("TST:M1:bHomed_RBV", PvValue::Int(1));
    let h = channel.connect("TST:M1:bHomed_RBV").unwrap();
    let m = CompletionMonitor::arm(&channel, &registry, h, Predicate::Level(PvValue::Bool(true)), T)
        .unwrap();
    assert!(m.is_satisfied());
    let outcome = m.wait(&TestClock::new(), T, POLL);
    assert_eq!(outcome.elapsed, Duration::ZERO);
    assert_eq!(outcome.observed, Some(PvValue::Int(1)));
}

#[test]
fn timeout_reports_condition_and_elapsed() {
    let (_manual, channel, registry) = setup();
    let h = channel.connect(DONE).unwrap();
    let m = CompletionMonitor::arm(&channel, &registry, h, Predicate::RisingEdge, T).unwrap();
    let clock = TestClock::new();
    let outcome = m.wait(&clock, Duration::from_millis(250), POLL);
    assert!(!outcome.satisfied);
    assert_eq!(outcome.elapsed, Duration::from_millis(250));

    let err = outcome.into_result().expect_err("timed out");
    match err.downcast_ref::<HarnessError>() {
        Some(HarnessError::WaitTimeout {
            condition,
            elapsed_ms,
        }) => {
            assert!(condition.contains(DONE), "{condition}");
            assert_eq!(*elapsed_ms, 250);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn detached_monitor_cannot_be_satisfied_later() {
    let (manual, channel, registry) = setup();
    let h = channel.connect(DONE).unwrap();
    let first = CompletionMonitor::arm(&channel, &registry, h, Predicate::RisingEdge, T).unwrap();
    let outcome = first.wait(&TestClock::new(), Duration::from_millis(30), POLL);
    assert!(!outcome.satisfied);
    assert_eq!(manual.subscriber_count(DONE), 0);

    let second = CompletionMonitor::arm(&channel, &registry, h, Predicate::RisingEdge, T).unwrap();
    assert_eq!(manual.subscriber_count(DONE), 1);
    manual.fire(DONE, PvValue::Bool(true));
    assert!(second.is_satisfied());
}

#[test]
fn rearming_detaches_previous_monitor() {
    let (manual, channel, registry) = setup();
    let h = channel.connect(DONE).unwrap();
    let stale = CompletionMonitor::arm(&channel, &registry, h, Predicate::RisingEdge, T).unwrap();
    let fresh = CompletionMonitor::arm(&channel, &registry, h, Predicate::RisingEdge, T).unwrap();

    assert_eq!(stale.state(), MonitorState::Detached);
    assert_eq!(manual.subscriber_count(DONE), 1);
    assert_eq!(registry.armed_count(), 1);

    manual.fire(DONE, PvValue::Bool(true));
    assert!(!stale.is_satisfied());
    assert!(fresh.is_satisfied());

    drop(stale);
    assert_eq!(registry.armed_count(), 1, "dropping the stale monitor keeps the fresh one");
    drop(fresh);
    assert_eq!(registry.armed_count(), 0);
    assert_eq!(manual.subscriber_count(DONE), 0);
}

#[test]
fn collect_records_series_without_satisfying() {
    let (manual, channel, registry) = setup();
    let pv = "TST:M1:fActPosition_RBV";
    let h = channel.connect(pv).unwrap();
    let m = CompletionMonitor::arm(&channel, &registry, h, Predicate::Collect, T).unwrap();
    for x in [0.5, 1.0, 1.0, 2.0] {
        manual.fire(pv, PvValue::Float(x));
    }
    assert!(!m.is_satisfied());
    let outcome = m.finish();
    assert_eq!(outcome.numeric_series(), vec![0.5, 1.0, 1.0, 2.0]);
    assert_eq!(manual.subscriber_count(pv), 0);
}

#[test]
fn notifications_from_another_thread_satisfy_wait() {
    let (manual, channel, registry) = setup();
    let h = channel.connect(DONE).unwrap();
    let m = CompletionMonitor::arm(&channel, &registry, h, Predicate::RisingEdge, T).unwrap();
    let bg = manual.clone();
    let t = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        bg.fire(DONE, PvValue::Bool(false));
        bg.fire(DONE, PvValue::Bool(true));
    });
    let outcome = m.wait(
        &axis_traits::MonotonicClock::new(),
        Duration::from_secs(2),
        Duration::from_millis(2),
    );
    t.join().unwrap();
    assert!(outcome.satisfied);
    assert!(outcome.elapsed >= Duration::from_millis(15));
}
