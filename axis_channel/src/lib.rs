//! Channel backends for the axis harness.
//!
//! The harness only sees `axis_traits::Channel`; this crate provides the
//! simulated controller used by the CLI and the test suites.
pub mod error;
pub mod sim;
pub mod util;

pub use error::{ChannelError, Result};
pub use sim::{SimChannel, SimFault, SimLayout, SimOptions};
