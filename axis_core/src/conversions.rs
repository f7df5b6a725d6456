//! `From` implementations bridging `axis_config` types to `axis_core` types.

use std::time::Duration;

use crate::config::{HarnessCfg, HomeParams, MotionLimits, Pulses, Timeouts, Tolerances};
use crate::scenario::{BatchPlan, StatesPlan};

// ── MotionLimits ─────────────────────────────────────────────────────────────

impl From<&axis_config::MotionCfg> for MotionLimits {
    fn from(c: &axis_config::MotionCfg) -> Self {
        Self {
            min_time: c.min_time_s,
            min_velocity: c.min_velocity,
            max_velocity: c.max_velocity,
            max_acceleration: c.max_acceleration,
        }
    }
}

// ── HomeParams ───────────────────────────────────────────────────────────────

impl From<&axis_config::HomeCfg> for HomeParams {
    fn from(c: &axis_config::HomeCfg) -> Self {
        Self {
            velocity: c.velocity,
            acceleration: c.acceleration,
            deceleration: c.deceleration,
            mode: c.mode,
        }
    }
}

// ── Tolerances ───────────────────────────────────────────────────────────────

impl From<&axis_config::Tolerances> for Tolerances {
    fn from(c: &axis_config::Tolerances) -> Self {
        Self {
            position: c.position,
            home_position: c.home_position,
            compensation: c.compensation,
            near_zero: c.near_zero,
        }
    }
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

impl From<&axis_config::Timeouts> for Timeouts {
    fn from(c: &axis_config::Timeouts) -> Self {
        Self {
            connect: Duration::from_millis(c.connect),
            write: Duration::from_millis(c.write),
            read: Duration::from_millis(c.read),
            move_done: Duration::from_millis(c.move_done),
            busy: Duration::from_millis(c.busy),
            home: Duration::from_millis(c.home),
            interrupt_done: Duration::from_millis(c.interrupt_done),
            error_set: Duration::from_millis(c.error_set),
            error_clear: Duration::from_millis(c.error_clear),
            state_move: Duration::from_millis(c.state_move),
            state_busy: Duration::from_millis(c.state_busy),
            poll: Duration::from_millis(c.poll),
        }
    }
}

// ── Pulses ───────────────────────────────────────────────────────────────────

impl From<&axis_config::Pulses> for Pulses {
    fn from(c: &axis_config::Pulses) -> Self {
        Self {
            hold: Duration::from_millis(c.hold),
            reset_settle: Duration::from_millis(c.reset_settle),
            backlash_settle: Duration::from_millis(c.backlash_settle),
            busy_lead: Duration::from_millis(c.busy_lead),
            state_dwell: Duration::from_millis(c.state_dwell),
        }
    }
}

// ── HarnessCfg ───────────────────────────────────────────────────────────────

impl From<&axis_config::Config> for HarnessCfg {
    fn from(c: &axis_config::Config) -> Self {
        Self {
            motion: (&c.motion).into(),
            home: (&c.home).into(),
            tolerances: (&c.tolerances).into(),
            timeouts: (&c.timeouts).into(),
            pulses: (&c.pulses).into(),
        }
    }
}

// ── Plans ────────────────────────────────────────────────────────────────────

impl From<&axis_config::Config> for BatchPlan {
    fn from(c: &axis_config::Config) -> Self {
        let b = &c.batch;
        Self {
            num_moves: b.num_moves,
            num_backlash: b.num_backlash,
            num_halt: b.num_halt,
            num_reset: b.num_reset,
            num_home: b.num_home,
            offset: b.offset,
            min_time: b.avg_motion_time,
            backlash_magnitude: b.backlash_magnitude,
            backlash_offset: (b.backlash_offset_min, b.backlash_offset_max),
            interrupt_offsets: b.interrupt_offsets.clone(),
            home_range: c.home.position_range,
        }
    }
}

impl From<&axis_config::Config> for StatesPlan {
    fn from(c: &axis_config::Config) -> Self {
        Self {
            count: c.states.count,
            interrupt_rounds: c.states.interrupt_rounds,
            num_moves: c.batch.num_moves,
        }
    }
}
