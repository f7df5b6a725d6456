use thiserror::Error;

/// Failure taxonomy of a verification run. Every variant is fatal to the run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HarnessError {
    #[error("pv {pv} not connected: {reason}")]
    Connection { pv: String, reason: String },
    #[error("write to {pv} failed: {reason}")]
    CommandWrite { pv: String, reason: String },
    #[error("read of {pv} failed: {reason}")]
    Read { pv: String, reason: String },
    #[error("timed out after {elapsed_ms} ms waiting for {condition}")]
    WaitTimeout { condition: String, elapsed_ms: u64 },
    #[error("axis never went busy within {timeout_ms} ms after move start")]
    NeverBusy { timeout_ms: u64 },
    #[error("assertion failed: {what} (expected {expected}, observed {observed})")]
    Assertion {
        what: String,
        expected: String,
        observed: String,
    },
    #[error("controller fault {error_id}: {message}")]
    DomainFault { error_id: i64, message: String },
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing channel")]
    MissingChannel,
    #[error("missing motor prefix")]
    MissingPrefix,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
