//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "axis_cli",
    version,
    about = "Motion verification harness for a PV-controlled axis"
)]
pub struct Cli {
    /// Path to config TOML (built-in defaults when the file is absent)
    #[arg(long, value_name = "FILE", default_value = "etc/axis_harness.toml")]
    pub config: PathBuf,

    /// Emit records, summary and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Options shared by every scenario run.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Motor PV prefix, e.g. `IOC:TST:M1:`
    #[arg(long, value_name = "PREFIX")]
    pub motor: String,

    /// Planned move duration in seconds (overrides [batch] avg_motion_time)
    #[arg(long, value_name = "SECONDS")]
    pub avg_motion_time: Option<f64>,

    /// Seed for randomized plans; printed in the summary so a run can be repeated
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Write the run summary as JSON to this path
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fixed move and backlash sequence
    Sequence {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Randomized batch of moves, backlash moves, halts, resets and homes
    Bulk {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, value_name = "N")]
        num_moves: Option<u32>,
        #[arg(long, value_name = "N")]
        num_backlash: Option<u32>,
        #[arg(long, value_name = "N")]
        num_halt: Option<u32>,
        #[arg(long, value_name = "N")]
        num_reset: Option<u32>,
        #[arg(long, value_name = "N")]
        num_home: Option<u32>,
    },
    /// Walk the state enumeration, interrupt state moves, trigger the unknown-state fault
    States {
        #[command(flatten)]
        run: RunArgs,
        /// Number of defined states (1..=N)
        #[arg(long, value_name = "N")]
        state_count: Option<i64>,
        #[arg(long, value_name = "N")]
        interrupt_rounds: Option<u32>,
        /// Random batch items after the walk
        #[arg(long, value_name = "N")]
        num_moves: Option<u32>,
    },
    /// Print the stage-to-axis table from a JSON symbol list
    Links {
        #[arg(long, value_name = "FILE")]
        symbols: PathBuf,
    },
}
