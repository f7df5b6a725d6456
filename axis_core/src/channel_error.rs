//! Maps `Box<dyn Error>` from the channel boundary to typed `HarnessError`.
//!
//! `axis_traits::Channel` returns boxed errors so any transport can sit behind
//! it; this module converts those to our taxonomy, with an optional
//! feature-gated path for `axis_channel::ChannelError` downcasting.

use crate::error::HarnessError;

/// Which channel operation produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOp {
    Connect,
    Read,
    Write,
    Subscribe,
}

impl ChannelOp {
    fn failure(self, pv: &str, reason: String) -> HarnessError {
        let pv = pv.to_string();
        match self {
            ChannelOp::Connect => HarnessError::Connection { pv, reason },
            ChannelOp::Write => HarnessError::CommandWrite { pv, reason },
            ChannelOp::Read | ChannelOp::Subscribe => HarnessError::Read { pv, reason },
        }
    }
}

/// Map a channel-boundary error for `pv` to a typed `HarnessError`.
///
/// The variant follows the operation, not the cause: a put that fails because
/// the PV dropped mid-run is still a `CommandWrite`. `Connection` is reserved
/// for `ChannelOp::Connect`. The reason text comes from the downcast
/// `ChannelError` when the `channel-errors` feature is on.
pub fn map_channel_error(
    op: ChannelOp,
    pv: &str,
    e: &(dyn std::error::Error + 'static),
) -> HarnessError {
    #[cfg(feature = "channel-errors")]
    {
        use axis_channel::ChannelError;
        if let Some(ce) = e.downcast_ref::<ChannelError>() {
            let reason = match ce {
                ChannelError::NotConnected(_) => format!("disconnected: {ce}"),
                other => other.to_string(),
            };
            return op.failure(pv, reason);
        }
    }

    op.failure(pv, e.to_string())
}
