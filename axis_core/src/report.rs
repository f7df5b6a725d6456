//! Pass/fail records and the run summary.
//!
//! Records are report output, not logs: each assertion emits exactly one
//! record through a `RecordSink` before any failure is raised.

use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub passed: bool,
    pub message: String,
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = if self.passed { "[PASS]" } else { "[FAIL]" };
        write!(f, "{tag} {}", self.message)
    }
}

pub trait RecordSink: Send + Sync {
    fn record(&self, rec: &Record);
}

/// Prints `[PASS] msg` / `[FAIL] msg` lines on stdout.
pub struct ConsoleSink;

impl RecordSink for ConsoleSink {
    fn record(&self, rec: &Record) {
        println!("{rec}");
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl RecordSink for MemorySink {
    fn record(&self, rec: &Record) {
        if let Ok(mut r) = self.records.lock() {
            r.push(rec.clone());
        }
    }
}

impl<T: RecordSink + ?Sized> RecordSink for std::sync::Arc<T> {
    fn record(&self, rec: &Record) {
        (**self).record(rec);
    }
}

/// Per-move outcome, including the position trace statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveSummary {
    pub label: String,
    pub target: f64,
    pub final_position: f64,
    pub velocity: f64,
    /// Number of position notifications received during the move.
    pub n_points: usize,
    /// Number of distinct positions among them.
    pub n_unique: usize,
    pub expected_compensation: Option<f64>,
    pub measured_compensation: Option<f64>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub passed: usize,
    pub failed: usize,
    pub scenarios_completed: usize,
    pub initial_position: Option<f64>,
    pub moves: Vec<MoveSummary>,
    pub elapsed: Duration,
    /// Rendered error of the failure that ended the run, if any.
    pub failure: Option<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.failure.is_none()
    }
}
