//! Motion profile calculator.
//!
//! Derives the parameter set written with a move command from the requested
//! offset and the configured limits. Pure; the current position is passed in.

use crate::config::MotionLimits;

/// Parameters of one move, computed fresh per command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    pub target: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub deceleration: f64,
}

/// Plan a move of `offset` from `current` that takes about `min_time` seconds.
///
/// - `velocity = |offset| / min_time`, raised to `limits.min_velocity` and
///   capped at `limits.max_velocity`.
/// - `acceleration = deceleration = min(limits.max_acceleration, 2 * velocity)`.
///
/// Never fails: a zero offset yields the velocity floor.
pub fn compute_profile(current: f64, offset: f64, min_time: f64, limits: &MotionLimits) -> MotionProfile {
    let raw = offset.abs() / min_time;
    // f64::max/min return the non-NaN operand, so 0/0 lands on the floor.
    let velocity = raw.max(limits.min_velocity).min(limits.max_velocity);
    let accel = limits.max_acceleration.min(2.0 * velocity);
    MotionProfile {
        target: current + offset,
        velocity,
        acceleration: accel,
        deceleration: accel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_move_is_raised_to_floor() {
        let p = compute_profile(0.0, 20.0, 2.5, &MotionLimits::default());
        assert_eq!(p.target, 20.0);
        assert_eq!(p.velocity, 15.0);
        assert_eq!(p.acceleration, 30.0);
        assert_eq!(p.deceleration, 30.0);
    }

    #[test]
    fn long_move_uses_distance_over_time() {
        let p = compute_profile(5.0, -100.0, 2.5, &MotionLimits::default());
        assert_eq!(p.target, -95.0);
        assert_eq!(p.velocity, 40.0);
        assert_eq!(p.acceleration, 80.0);
    }

    #[test]
    fn zero_offset_yields_floor_velocity() {
        let p = compute_profile(1.0, 0.0, 2.5, &MotionLimits::default());
        assert_eq!(p.velocity, 15.0);
        assert_eq!(p.target, 1.0);
    }

    #[test]
    fn caps_apply() {
        let limits = MotionLimits {
            max_velocity: 100.0,
            max_acceleration: 150.0,
            ..MotionLimits::default()
        };
        let p = compute_profile(0.0, 10_000.0, 1.0, &limits);
        assert_eq!(p.velocity, 100.0);
        assert_eq!(p.acceleration, 150.0);
    }
}
