//! Point-in-time snapshot of the axis status PVs.

use std::sync::Arc;
use std::time::Duration;

use axis_traits::{Channel, PvValue};

use crate::channel_error::{ChannelOp, map_channel_error};
use crate::error::Result;
use crate::pvs::{AxisPvs, PvKey};

#[derive(Debug, Clone, PartialEq)]
pub struct AxisStatus {
    pub busy: bool,
    pub done: bool,
    pub error: bool,
    pub error_id: i64,
    pub homed: bool,
    pub error_message: String,
    pub actual_position: f64,
}

impl AxisStatus {
    pub fn read(channel: &Arc<dyn Channel>, pvs: &AxisPvs, timeout: Duration) -> Result<Self> {
        let get = |key| read_pv(channel, pvs, key, timeout);
        Ok(Self {
            busy: get(PvKey::Busy)?.is_truthy(),
            done: get(PvKey::Done)?.is_truthy(),
            error: get(PvKey::Error)?.is_truthy(),
            error_id: get(PvKey::ErrorId)?.as_i64().unwrap_or(0),
            homed: get(PvKey::Homed)?.is_truthy(),
            error_message: get(PvKey::ErrorMessage)?.as_text(),
            actual_position: get(PvKey::ActPosition)?.as_f64().unwrap_or(f64::NAN),
        })
    }
}

/// Read one PV, mapping channel failures to `HarnessError::Read`.
pub fn read_pv(
    channel: &Arc<dyn Channel>,
    pvs: &AxisPvs,
    key: PvKey,
    timeout: Duration,
) -> Result<PvValue> {
    let name = pvs.name(key);
    let v = channel
        .get(pvs.handle(key), timeout)
        .map_err(|e| eyre::Report::new(map_channel_error(ChannelOp::Read, name, e.as_ref())))?;
    tracing::trace!(pv = name, value = %v, "get");
    Ok(v)
}
