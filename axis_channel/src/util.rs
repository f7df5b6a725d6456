use std::time::{Duration, Instant};

use crate::error::{ChannelError, Result};

/// Poll `ready` until it returns true or `timeout` expires, sleeping
/// `poll_interval` between checks. `what` names the condition in the error.
pub fn wait_until_with_timeout(
    mut ready: impl FnMut() -> bool,
    what: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !ready() {
        if Instant::now() >= deadline {
            return Err(ChannelError::Timeout(what.to_string()));
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}
