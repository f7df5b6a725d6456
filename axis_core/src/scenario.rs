//! Scenario plans and the run loop.
//!
//! A `Plan` is an ordered list of `Scenario`s. Plans are built up front (the
//! random ones from a caller-supplied RNG, so a seed reproduces a run) and
//! then executed fail-fast by `Harness::run`.

use std::sync::Arc;

use axis_traits::{Channel, Clock};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::backlash::BacklashConfig;
use crate::error::{HarnessError, Result};
use crate::harness::{Harness, Interrupt};
use crate::report::{RecordSink, RunReport};

/// State requested by the fault scenario; never a defined state.
pub const UNKNOWN_STATE: i64 = 0;

#[derive(Debug, Clone, PartialEq)]
pub enum Scenario {
    Move {
        offset: f64,
        min_time: f64,
        backlash: Option<BacklashConfig>,
    },
    Home {
        position: f64,
    },
    InterruptMove {
        offset: f64,
        min_time: f64,
        kind: Interrupt,
    },
    State(i64),
    InterruptState {
        state: i64,
        kind: Interrupt,
    },
    UnknownState(i64),
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scenario::Move {
                offset,
                backlash: None,
                ..
            } => write!(f, "move {offset:+.3}"),
            Scenario::Move {
                offset,
                backlash: Some(b),
                ..
            } => write!(
                f,
                "backlash move {offset:+.3} (backlash {:+.3}, enabled={})",
                b.magnitude, b.enabled
            ),
            Scenario::Home { position } => write!(f, "home to {position:.3}"),
            Scenario::InterruptMove { offset, kind, .. } => {
                write!(f, "move {offset:+.3} with {kind}")
            }
            Scenario::State(s) => write!(f, "state {s}"),
            Scenario::InterruptState { state, kind } => write!(f, "state {state} with {kind}"),
            Scenario::UnknownState(s) => write!(f, "unknown state {s}"),
        }
    }
}

/// Bulk batch parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub num_moves: u32,
    pub num_backlash: u32,
    pub num_halt: u32,
    pub num_reset: u32,
    pub num_home: u32,
    /// Magnitude of normal moves; the sign alternates starting positive.
    pub offset: f64,
    pub min_time: f64,
    pub backlash_magnitude: f64,
    /// Inclusive range of backlash move distances.
    pub backlash_offset: (f64, f64),
    pub interrupt_offsets: Vec<f64>,
    /// Home targets are drawn from `[-home_range, home_range]`.
    pub home_range: f64,
}

impl Default for BatchPlan {
    fn default() -> Self {
        Self {
            num_moves: 5,
            num_backlash: 5,
            num_halt: 0,
            num_reset: 0,
            num_home: 0,
            offset: 15.0,
            min_time: 2.5,
            backlash_magnitude: 1.7,
            backlash_offset: (10.0, 20.0),
            interrupt_offsets: vec![10.0, -10.0, 15.0, -15.0],
            home_range: 25.0,
        }
    }
}

/// State-enum plan parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatesPlan {
    /// Defined states are `1..=count`.
    pub count: i64,
    pub interrupt_rounds: u32,
    /// Random batch items of {normal, halt, reset, error}.
    pub num_moves: u32,
}

impl Default for StatesPlan {
    fn default() -> Self {
        Self {
            count: 15,
            interrupt_rounds: 2,
            num_moves: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    pub scenarios: Vec<Scenario>,
}

impl Plan {
    /// Fixed move and backlash sequence.
    pub fn sequence(min_time: f64) -> Self {
        let mv = |offset, backlash| Scenario::Move {
            offset,
            min_time,
            backlash,
        };
        Self {
            scenarios: vec![
                mv(20.0, None),
                mv(-10.0, None),
                mv(5.0, None),
                mv(7.0, Some(BacklashConfig::enabled(2.5))),
                mv(-9.0, Some(BacklashConfig::enabled(2.5))),
                mv(6.0, Some(BacklashConfig::disabled(2.5))),
                mv(-7.0, Some(BacklashConfig::enabled(-1.7))),
                mv(5.0, Some(BacklashConfig::enabled(-1.7))),
            ],
        }
    }

    /// Randomized bulk batch: moves, backlash moves, halts, resets, homes.
    pub fn bulk<R: Rng + ?Sized>(p: &BatchPlan, rng: &mut R) -> Self {
        let mut scenarios = Vec::new();

        for i in 0..p.num_moves {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            scenarios.push(Scenario::Move {
                offset: sign * p.offset,
                min_time: p.min_time,
                backlash: None,
            });
        }

        let (lo, hi) = p.backlash_offset;
        for _ in 0..p.num_backlash {
            let magnitude = if rng.gen_bool(0.5) {
                p.backlash_magnitude
            } else {
                -p.backlash_magnitude
            };
            let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let distance = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
            scenarios.push(Scenario::Move {
                offset: direction * distance,
                min_time: p.min_time,
                backlash: Some(BacklashConfig::enabled(magnitude)),
            });
        }

        for (count, kind) in [(p.num_halt, Interrupt::Halt), (p.num_reset, Interrupt::Reset)] {
            for _ in 0..count {
                if let Some(offset) = p.interrupt_offsets.choose(rng) {
                    scenarios.push(Scenario::InterruptMove {
                        offset: *offset,
                        min_time: p.min_time,
                        kind,
                    });
                }
            }
        }

        for _ in 0..p.num_home {
            let position = if p.home_range > 0.0 {
                rng.gen_range(-p.home_range..=p.home_range)
            } else {
                0.0
            };
            scenarios.push(Scenario::Home { position });
        }

        Self { scenarios }
    }

    /// Walk every state, interrupt random states, then a random batch.
    pub fn states<R: Rng + ?Sized>(p: &StatesPlan, rng: &mut R) -> Self {
        let count = p.count.max(1);
        let mut scenarios: Vec<Scenario> = (1..=count).map(Scenario::State).collect();

        for _ in 0..p.interrupt_rounds {
            let state = rng.gen_range(1..=count);
            scenarios.push(Scenario::InterruptState {
                state,
                kind: Interrupt::Halt,
            });
            scenarios.push(Scenario::InterruptState {
                state,
                kind: Interrupt::Reset,
            });
        }

        for _ in 0..p.num_moves {
            let state = rng.gen_range(1..=count);
            scenarios.push(match rng.gen_range(0..4) {
                0 => Scenario::State(state),
                1 => Scenario::InterruptState {
                    state,
                    kind: Interrupt::Halt,
                },
                2 => Scenario::InterruptState {
                    state,
                    kind: Interrupt::Reset,
                },
                _ => Scenario::UnknownState(UNKNOWN_STATE),
            });
        }

        Self { scenarios }
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Errors that already emitted their own `[FAIL]` record.
fn already_recorded(e: &eyre::Report) -> bool {
    e.chain().any(|c| {
        matches!(
            c.downcast_ref::<HarnessError>(),
            Some(
                HarnessError::Assertion { .. }
                    | HarnessError::NeverBusy { .. }
                    | HarnessError::DomainFault { .. }
            )
        )
    })
}

impl Harness {
    pub fn run_scenario(&mut self, scenario: &Scenario) -> Result<()> {
        match scenario {
            Scenario::Move {
                offset,
                min_time,
                backlash,
            } => self.move_relative(*offset, *min_time, *backlash).map(|_| ()),
            Scenario::Home { position } => self.home(*position),
            Scenario::InterruptMove {
                offset,
                min_time,
                kind,
            } => self.interrupt_move(*offset, *min_time, *kind),
            Scenario::State(s) => self.state_move(*s),
            Scenario::InterruptState { state, kind } => self.interrupt_state(*state, *kind),
            Scenario::UnknownState(s) => self.unknown_state(*s),
        }
    }

    /// Initial check, then every scenario in order; stops at the first failure.
    ///
    /// The report stays available through `report()` when this returns an error.
    pub fn run(&mut self, plan: &Plan) -> Result<RunReport> {
        let start = self.clock().now();
        let result = self.run_inner(plan);
        let elapsed = self.clock().elapsed_since(start);
        let report = self.report_mut();
        report.elapsed = elapsed;
        match result {
            Ok(()) => {
                tracing::info!(
                    passed = report.passed,
                    scenarios = report.scenarios_completed,
                    "run complete"
                );
                Ok(report.clone())
            }
            Err(e) => {
                report.failure = Some(format!("{e:#}"));
                Err(e)
            }
        }
    }

    fn run_inner(&mut self, plan: &Plan) -> Result<()> {
        self.initial_check()?;
        for (i, scenario) in plan.scenarios.iter().enumerate() {
            tracing::info!(index = i + 1, total = plan.len(), %scenario, "scenario start");
            if let Err(e) = self.run_scenario(scenario) {
                tracing::error!(%scenario, error = %e, "scenario failed");
                if !already_recorded(&e) {
                    self.emit(false, format!("{scenario}: {e}"));
                }
                return Err(e);
            }
            self.report_mut().scenarios_completed += 1;
        }
        Ok(())
    }
}

/// Build a harness over `channel` and run `plan` against it.
pub fn run_scenarios(
    channel: Arc<dyn Channel>,
    clock: Arc<dyn Clock + Send + Sync>,
    prefix: &str,
    cfg: &axis_config::Config,
    plan: &Plan,
    sink: Box<dyn RecordSink>,
) -> Result<RunReport> {
    let mut harness = Harness::builder()
        .with_channel(channel)
        .with_prefix(prefix)
        .with_file_config(cfg)
        .with_clock(clock)
        .with_sink(sink)
        .build()?;
    harness.run(plan)
}
