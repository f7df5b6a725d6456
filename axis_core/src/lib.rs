#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Axis motion verification harness (transport-agnostic).
//!
//! All controller interaction goes through `axis_traits::Channel`; time goes
//! through `axis_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Profile**: offset and limits to velocity/acceleration (`profile`)
//! - **Backlash**: expected compensation per move direction (`backlash`)
//! - **Dispatch**: ordered parameter and trigger writes (`dispatcher`)
//! - **Monitors**: callback-driven level and rising-edge waits (`monitor`)
//! - **Harness**: scenarios, assertions and pass/fail records (`harness`, `scenario`)
//! - **Links**: stage-to-axis mapping from symbol metadata (`links`)

pub mod atomic;
pub mod backlash;
pub mod builder;
pub mod channel_error;
pub mod config;
pub mod conversions;
pub mod dispatcher;
pub mod error;
pub mod harness;
pub mod links;
pub mod mocks;
pub mod monitor;
pub mod profile;
pub mod pvs;
pub mod report;
pub mod scenario;
pub mod status;
pub mod util;

pub use backlash::{BacklashConfig, Direction, expected_compensation};
pub use builder::HarnessBuilder;
pub use config::{HarnessCfg, HomeParams, MotionLimits, Pulses, Timeouts, Tolerances};
pub use dispatcher::{CommandRequest, Dispatcher};
pub use error::{BuildError, HarnessError, Report, Result};
pub use harness::{Harness, Interrupt};
pub use monitor::{CompletionMonitor, MonitorRegistry, MonitorState, Predicate, WaitOutcome};
pub use profile::{MotionProfile, compute_profile};
pub use pvs::{AxisPvs, PvKey, PvNames};
pub use report::{ConsoleSink, MemorySink, MoveSummary, Record, RecordSink, RunReport};
pub use scenario::{BatchPlan, Plan, Scenario, StatesPlan, run_scenarios};
pub use status::AxisStatus;
