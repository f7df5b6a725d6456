use std::sync::Arc;
use std::time::Duration;

use axis_config::PvSuffixes;
use axis_core::mocks::ManualChannel;
use axis_core::{BuildError, Harness, HarnessCfg, MemorySink, MotionLimits, Tolerances};
use axis_traits::clock::test_clock::TestClock;
use axis_traits::{Channel, PvValue};
use rstest::rstest;

fn channel() -> Arc<dyn Channel> {
    Arc::new(ManualChannel::new())
}

#[test]
fn try_build_without_channel_fails() {
    let err = Harness::builder()
        .with_prefix("TST:M1:")
        .try_build()
        .expect_err("channel is required");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingChannel)
    ));
}

#[test]
fn try_build_without_prefix_fails() {
    let err = Harness::builder()
        .with_channel(channel())
        .try_build()
        .expect_err("prefix is required");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingPrefix)
    ));
}

#[rstest]
#[case::zero_min_time(MotionLimits { min_time: 0.0, ..MotionLimits::default() }, Tolerances::default())]
#[case::inverted_velocity(MotionLimits { min_velocity: 100.0, max_velocity: 10.0, ..MotionLimits::default() }, Tolerances::default())]
#[case::nan_acceleration(MotionLimits { max_acceleration: f64::NAN, ..MotionLimits::default() }, Tolerances::default())]
#[case::zero_position_tolerance(MotionLimits::default(), Tolerances { position: 0.0, ..Tolerances::default() })]
fn invalid_config_is_rejected(#[case] motion: MotionLimits, #[case] tolerances: Tolerances) {
    let cfg = HarnessCfg {
        motion,
        tolerances,
        ..HarnessCfg::default()
    };
    let err = Harness::builder()
        .with_channel(channel())
        .with_prefix("TST:M1:")
        .with_config(cfg)
        .build()
        .expect_err("config must be rejected");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn custom_suffixes_are_used_for_every_pv() {
    let manual = ManualChannel::new();
    let suffixes = PvSuffixes {
        done: "Done".into(),
        ..PvSuffixes::default()
    };
    manual.set("X:Y:Done", PvValue::Bool(true));
    manual.set("X:Y:fActPosition_RBV", PvValue::Float(4.25));
    let sink = Arc::new(MemorySink::new());
    let mut h = Harness::builder()
        .with_channel(Arc::new(manual.clone()))
        .with_prefix("X:Y:")
        .with_suffixes(suffixes)
        .with_clock(Arc::new(TestClock::new()))
        .with_sink(Box::new(Arc::clone(&sink)))
        .build()
        .unwrap();

    let status = h.status().unwrap();
    assert!(status.done);
    assert_eq!(status.actual_position, 4.25);

    h.initial_check().unwrap();
    assert_eq!(h.report().initial_position, Some(4.25));
    assert_eq!(sink.records().len(), 1);
    let writes: Vec<String> = manual.writes().into_iter().map(|(n, _)| n).collect();
    assert_eq!(writes, ["X:Y:bReset", "X:Y:bReset"]);
}

#[test]
fn initial_check_fails_when_error_persists() {
    let manual = ManualChannel::new();
    manual.set("TST:M1:bError_RBV", PvValue::Bool(true));
    manual.set("TST:M1:nErrorId_RBV", PvValue::Int(17_504));
    manual.set("TST:M1:sErrorMessage_RBV", PvValue::Str("Axis fault".into()));
    let clock = TestClock::new();
    let mut h = Harness::builder()
        .with_channel(Arc::new(manual))
        .with_prefix("TST:M1:")
        .with_clock(Arc::new(clock.clone()))
        .with_sink(Box::new(MemorySink::new()))
        .build()
        .unwrap();
    let err = h.initial_check().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<axis_core::HarnessError>(),
        Some(axis_core::HarnessError::DomainFault { error_id: 17_504, .. })
    ));
    assert_eq!(h.report().failed, 1);
    // Pulse hold plus settle, all on the virtual clock.
    assert_eq!(clock.offset(), Duration::from_millis(550));
}
