use axis_core::{BacklashConfig, Direction, MotionLimits, compute_profile, expected_compensation};
use proptest::prelude::*;

proptest! {
    #[test]
    fn velocity_stays_within_limits(
        current in -1000.0f64..1000.0,
        offset in -5000.0f64..5000.0,
        min_time in 0.01f64..60.0,
    ) {
        let limits = MotionLimits::default();
        let p = compute_profile(current, offset, min_time, &limits);
        prop_assert!(p.velocity >= limits.min_velocity);
        prop_assert!(p.velocity <= limits.max_velocity);
        prop_assert_eq!(p.acceleration, p.deceleration);
        prop_assert_eq!(p.acceleration, limits.max_acceleration.min(2.0 * p.velocity));
        prop_assert!((p.target - (current + offset)).abs() < 1e-9);
    }

    #[test]
    fn compensation_only_against_backlash_sign(
        magnitude in prop_oneof![-50.0f64..-1e-6, 1e-6f64..50.0],
        forward in any::<bool>(),
    ) {
        let dir = if forward { Direction::Forward } else { Direction::Reverse };
        let comp = expected_compensation(&BacklashConfig::enabled(magnitude), dir);
        if magnitude.signum() == dir.sign() {
            prop_assert_eq!(comp, 0.0);
        } else {
            prop_assert_eq!(comp, magnitude.abs());
        }
        let off = expected_compensation(&BacklashConfig::disabled(magnitude), dir);
        prop_assert_eq!(off, 0.0);
    }
}

#[test]
fn twenty_unit_move_is_clamped_up_to_floor() {
    let p = compute_profile(0.0, 20.0, 2.5, &MotionLimits::default());
    assert_eq!(p.target, 20.0);
    assert_eq!(p.velocity, 15.0);
    assert_eq!(p.acceleration, 30.0);
    assert_eq!(p.deceleration, 30.0);
}

#[test]
fn negative_backlash_examples() {
    let b = BacklashConfig::enabled(-1.7);
    assert_eq!(expected_compensation(&b, Direction::Forward), 1.7);
    assert_eq!(expected_compensation(&b, Direction::Reverse), 0.0);
}
