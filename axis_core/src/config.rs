//! Configuration types for the verification harness.
//!
//! These are the runtime structs consumed by `Harness` and the calculators.
//! They are separate from the TOML-deserialized config in `axis_config`;
//! durations are already converted from milliseconds.

use std::time::Duration;

/// Limits used by the motion profile calculator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionLimits {
    /// Shortest time a move is planned to take (seconds).
    pub min_time: f64,
    /// Velocity floor applied to short moves.
    pub min_velocity: f64,
    pub max_velocity: f64,
    pub max_acceleration: f64,
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self {
            min_time: 2.5,
            min_velocity: 15.0,
            max_velocity: 2200.0,
            max_acceleration: 15000.0,
        }
    }
}

/// Parameters written with every home command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeParams {
    pub velocity: f64,
    pub acceleration: f64,
    pub deceleration: f64,
    pub mode: i64,
}

impl Default for HomeParams {
    fn default() -> Self {
        Self {
            velocity: 50.0,
            acceleration: 100.0,
            deceleration: 100.0,
            mode: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub position: f64,
    pub home_position: f64,
    pub compensation: f64,
    /// Expected compensation below this takes the "no compensation" branch.
    pub near_zero: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            position: 0.03,
            home_position: 0.05,
            compensation: 0.01,
            near_zero: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub write: Duration,
    pub read: Duration,
    pub move_done: Duration,
    pub busy: Duration,
    pub home: Duration,
    pub interrupt_done: Duration,
    pub error_set: Duration,
    pub error_clear: Duration,
    pub state_move: Duration,
    pub state_busy: Duration,
    /// Poll cadence of every completion wait.
    pub poll: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            write: Duration::from_secs(1),
            read: Duration::from_secs(1),
            move_done: Duration::from_secs(10),
            busy: Duration::from_secs(4),
            home: Duration::from_secs(14),
            interrupt_done: Duration::from_secs(10),
            error_set: Duration::from_secs(2),
            error_clear: Duration::from_secs(6),
            state_move: Duration::from_secs(10),
            state_busy: Duration::from_secs(7),
            poll: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulses {
    /// How long a halt/reset flag is held high.
    pub hold: Duration,
    pub reset_settle: Duration,
    pub backlash_settle: Duration,
    /// Delay between move start and the busy check of a move interrupt.
    pub busy_lead: Duration,
    /// Run time of a state move after busy, before the interrupting pulse.
    pub state_dwell: Duration,
}

impl Default for Pulses {
    fn default() -> Self {
        Self {
            hold: Duration::from_millis(250),
            reset_settle: Duration::from_millis(300),
            backlash_settle: Duration::from_millis(300),
            busy_lead: Duration::from_millis(300),
            state_dwell: Duration::from_millis(600),
        }
    }
}

/// Everything the harness needs besides the channel, clock and PV names.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HarnessCfg {
    pub motion: MotionLimits,
    pub home: HomeParams,
    pub tolerances: Tolerances,
    pub timeouts: Timeouts,
    pub pulses: Pulses,
}
