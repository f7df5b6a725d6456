//! PV name map and connected handles for one axis.

use std::sync::Arc;
use std::time::Duration;

use axis_config::PvSuffixes;
use axis_traits::{Channel, PvHandle};
use eyre::WrapErr;

use crate::channel_error::{ChannelOp, map_channel_error};
use crate::error::{HarnessError, Result};

/// Every process variable the harness touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PvKey {
    MoveCmd,
    HomeCmd,
    Reset,
    Halt,
    Position,
    HomePosition,
    Velocity,
    Acceleration,
    Deceleration,
    CmdData,
    Command,
    BacklashEnable,
    Backlash,
    ActPosition,
    Done,
    Busy,
    Error,
    ErrorId,
    Homed,
    ErrorMessage,
    BacklashStatus,
    CurrentBacklash,
    StateSet,
}

impl PvKey {
    pub const ALL: [PvKey; 23] = [
        PvKey::MoveCmd,
        PvKey::HomeCmd,
        PvKey::Reset,
        PvKey::Halt,
        PvKey::Position,
        PvKey::HomePosition,
        PvKey::Velocity,
        PvKey::Acceleration,
        PvKey::Deceleration,
        PvKey::CmdData,
        PvKey::Command,
        PvKey::BacklashEnable,
        PvKey::Backlash,
        PvKey::ActPosition,
        PvKey::Done,
        PvKey::Busy,
        PvKey::Error,
        PvKey::ErrorId,
        PvKey::Homed,
        PvKey::ErrorMessage,
        PvKey::BacklashStatus,
        PvKey::CurrentBacklash,
        PvKey::StateSet,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn suffix(self, s: &PvSuffixes) -> &str {
        match self {
            PvKey::MoveCmd => &s.move_cmd,
            PvKey::HomeCmd => &s.home_cmd,
            PvKey::Reset => &s.reset,
            PvKey::Halt => &s.halt,
            PvKey::Position => &s.position,
            PvKey::HomePosition => &s.home_position,
            PvKey::Velocity => &s.velocity,
            PvKey::Acceleration => &s.acceleration,
            PvKey::Deceleration => &s.deceleration,
            PvKey::CmdData => &s.cmd_data,
            PvKey::Command => &s.command,
            PvKey::BacklashEnable => &s.backlash_enable,
            PvKey::Backlash => &s.backlash,
            PvKey::ActPosition => &s.act_position,
            PvKey::Done => &s.done,
            PvKey::Busy => &s.busy,
            PvKey::Error => &s.error,
            PvKey::ErrorId => &s.error_id,
            PvKey::Homed => &s.homed,
            PvKey::ErrorMessage => &s.error_message,
            PvKey::BacklashStatus => &s.backlash_status,
            PvKey::CurrentBacklash => &s.current_backlash,
            PvKey::StateSet => &s.state_set,
        }
    }
}

/// Full PV names for one axis: motor prefix + suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvNames {
    names: Vec<String>,
}

impl PvNames {
    pub fn new(prefix: &str, suffixes: &PvSuffixes) -> Self {
        Self {
            names: PvKey::ALL
                .iter()
                .map(|k| format!("{prefix}{}", k.suffix(suffixes)))
                .collect(),
        }
    }

    pub fn get(&self, key: PvKey) -> &str {
        &self.names[key.index()]
    }
}

/// Connected handles for every `PvKey`.
#[derive(Debug, Clone)]
pub struct AxisPvs {
    names: PvNames,
    handles: Vec<PvHandle>,
}

impl AxisPvs {
    /// Connect every PV, failing on the first one that does not come up in `timeout`.
    pub fn connect(channel: &Arc<dyn Channel>, names: PvNames, timeout: Duration) -> Result<Self> {
        let mut handles = Vec::with_capacity(PvKey::ALL.len());
        for key in PvKey::ALL {
            let name = names.get(key);
            let handle = channel
                .connect(name)
                .map_err(|e| map_channel_error(ChannelOp::Connect, name, e.as_ref()))
                .map_err(eyre::Report::new)?;
            if !channel.wait_connected(handle, timeout) {
                return Err(eyre::Report::new(HarnessError::Connection {
                    pv: name.to_string(),
                    reason: format!("no connection within {} ms", timeout.as_millis()),
                }))
                .wrap_err("connecting axis PVs");
            }
            tracing::debug!(pv = name, "connected");
            handles.push(handle);
        }
        tracing::info!(count = handles.len(), "all axis PVs connected");
        Ok(Self { names, handles })
    }

    pub fn handle(&self, key: PvKey) -> PvHandle {
        self.handles[key.index()]
    }

    pub fn name(&self, key: PvKey) -> &str {
        self.names.get(key)
    }

    pub fn names(&self) -> &PvNames {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_join_prefix_and_suffix() {
        let names = PvNames::new("TST:M1:", &PvSuffixes::default());
        assert_eq!(names.get(PvKey::Done), "TST:M1:bDone_RBV");
        assert_eq!(names.get(PvKey::StateSet), "TST:M1:STATES:SET");
    }

    #[test]
    fn key_order_matches_all() {
        for (i, k) in PvKey::ALL.iter().enumerate() {
            assert_eq!(k.index(), i);
        }
    }
}
