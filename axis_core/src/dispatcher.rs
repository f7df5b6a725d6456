//! Command dispatcher: turns a `CommandRequest` into ordered channel writes.
//!
//! Parameters are always written before the trigger, and the trigger is the
//! last write. A failed write aborts the command; nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use axis_traits::{Channel, Clock, PvValue};

use crate::backlash::BacklashConfig;
use crate::channel_error::{ChannelOp, map_channel_error};
use crate::config::HomeParams;
use crate::error::Result;
use crate::profile::MotionProfile;
use crate::pvs::{AxisPvs, PvKey};

/// `nCommand` value selecting an absolute move.
pub const COMMAND_MOVE_ABSOLUTE: i64 = 1;
/// `nCommand` value selecting a home.
pub const COMMAND_HOME: i64 = 2;

/// One command for the axis; dispatch is fire-and-forget.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandRequest {
    Move(MotionProfile),
    Home {
        position: f64,
        mode: i64,
        profile: MotionProfile,
    },
    Halt,
    Reset,
    StateSet(i64),
}

impl CommandRequest {
    pub fn home(position: f64, params: &HomeParams) -> Self {
        CommandRequest::Home {
            position,
            mode: params.mode,
            profile: MotionProfile {
                target: position,
                velocity: params.velocity,
                acceleration: params.acceleration,
                deceleration: params.deceleration,
            },
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CommandRequest::Move(_) => "move",
            CommandRequest::Home { .. } => "home",
            CommandRequest::Halt => "halt",
            CommandRequest::Reset => "reset",
            CommandRequest::StateSet(_) => "state",
        }
    }
}

pub struct Dispatcher {
    channel: Arc<dyn Channel>,
    pvs: Arc<AxisPvs>,
    clock: Arc<dyn Clock + Send + Sync>,
    write_timeout: Duration,
    pulse_hold: Duration,
}

impl Dispatcher {
    pub fn new(
        channel: Arc<dyn Channel>,
        pvs: Arc<AxisPvs>,
        clock: Arc<dyn Clock + Send + Sync>,
        write_timeout: Duration,
        pulse_hold: Duration,
    ) -> Self {
        Self {
            channel,
            pvs,
            clock,
            write_timeout,
            pulse_hold,
        }
    }

    pub fn dispatch(&self, request: &CommandRequest) -> Result<()> {
        tracing::info!(command = request.label(), ?request, "dispatch");
        match request {
            CommandRequest::Move(p) => {
                self.write(PvKey::Position, PvValue::Float(p.target))?;
                self.write_dynamics(p)?;
                self.write(PvKey::Command, PvValue::Int(COMMAND_MOVE_ABSOLUTE))?;
                self.write(PvKey::MoveCmd, PvValue::Bool(true))
            }
            CommandRequest::Home {
                position,
                mode,
                profile,
            } => {
                self.write(PvKey::HomePosition, PvValue::Float(*position))?;
                self.write_dynamics(profile)?;
                self.write(PvKey::CmdData, PvValue::Int(*mode))?;
                self.write(PvKey::Command, PvValue::Int(COMMAND_HOME))?;
                self.write(PvKey::HomeCmd, PvValue::Bool(true))
            }
            CommandRequest::Halt => self.pulse(PvKey::Halt),
            CommandRequest::Reset => self.pulse(PvKey::Reset),
            CommandRequest::StateSet(state) => self.write(PvKey::StateSet, PvValue::Int(*state)),
        }
    }

    /// Write the backlash setting, then wait `settle` for the controller to latch it.
    pub fn configure_backlash(&self, backlash: &BacklashConfig, settle: Duration) -> Result<()> {
        tracing::info!(
            enabled = backlash.enabled,
            magnitude = backlash.magnitude,
            "configure backlash"
        );
        self.write(PvKey::BacklashEnable, PvValue::Bool(backlash.enabled))?;
        self.write(PvKey::Backlash, PvValue::Float(backlash.magnitude))?;
        self.clock.sleep(settle);
        Ok(())
    }

    fn write_dynamics(&self, p: &MotionProfile) -> Result<()> {
        self.write(PvKey::Velocity, PvValue::Float(p.velocity))?;
        self.write(PvKey::Acceleration, PvValue::Float(p.acceleration))?;
        self.write(PvKey::Deceleration, PvValue::Float(p.deceleration))
    }

    /// Raise a flag, hold it, then lower it.
    fn pulse(&self, key: PvKey) -> Result<()> {
        self.write(key, PvValue::Bool(true))?;
        self.clock.sleep(self.pulse_hold);
        self.write(key, PvValue::Bool(false))
    }

    pub fn write(&self, key: PvKey, value: PvValue) -> Result<()> {
        let name = self.pvs.name(key);
        tracing::debug!(pv = name, %value, "put");
        self.channel
            .put(self.pvs.handle(key), value, self.write_timeout)
            .map_err(|e| eyre::Report::new(map_channel_error(ChannelOp::Write, name, e.as_ref())))
    }
}
