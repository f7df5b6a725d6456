//! Verification harness: dispatch, wait, read back, assert.
//!
//! Every scenario follows the same shape: build the expectation, arm the
//! monitors it needs, dispatch, wait, read final values and assert. Each
//! assertion emits one record before a failure is raised, and the first
//! failure ends the scenario.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axis_traits::{Channel, Clock, PvValue};
use eyre::WrapErr;

use crate::backlash::{BacklashConfig, Direction, expected_compensation};
use crate::config::HarnessCfg;
use crate::dispatcher::{CommandRequest, Dispatcher};
use crate::error::{HarnessError, Result};
use crate::monitor::{CompletionMonitor, MonitorRegistry, Predicate};
use crate::profile::{MotionProfile, compute_profile};
use crate::pvs::{AxisPvs, PvKey};
use crate::report::{MoveSummary, Record, RecordSink, RunReport};
use crate::status::{AxisStatus, read_pv};
use crate::util::{count_unique, millis, within};

/// Flag pulsed to interrupt a running move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Halt,
    Reset,
}

impl std::fmt::Display for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Interrupt::Halt => "HALT",
            Interrupt::Reset => "RESET",
        })
    }
}

/// When the interrupting pulse goes out relative to the start command.
#[derive(Debug, Clone, Copy)]
struct InterruptTiming {
    /// Sleep after the start command, before waiting for busy.
    lead: Duration,
    busy_timeout: Duration,
    /// Sleep after busy, before the pulse.
    dwell: Duration,
}

pub struct Harness {
    channel: Arc<dyn Channel>,
    clock: Arc<dyn Clock + Send + Sync>,
    pvs: Arc<AxisPvs>,
    dispatcher: Dispatcher,
    monitors: Arc<MonitorRegistry>,
    cfg: HarnessCfg,
    sink: Box<dyn RecordSink>,
    report: RunReport,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("done_pv", &self.pvs.name(PvKey::Done))
            .field("passed", &self.report.passed)
            .field("failed", &self.report.failed)
            .finish()
    }
}

impl Harness {
    pub(crate) fn new(
        channel: Arc<dyn Channel>,
        clock: Arc<dyn Clock + Send + Sync>,
        pvs: AxisPvs,
        cfg: HarnessCfg,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        let pvs = Arc::new(pvs);
        let dispatcher = Dispatcher::new(
            Arc::clone(&channel),
            Arc::clone(&pvs),
            Arc::clone(&clock),
            cfg.timeouts.write,
            cfg.pulses.hold,
        );
        Self {
            channel,
            clock,
            pvs,
            dispatcher,
            monitors: Arc::new(MonitorRegistry::new()),
            cfg,
            sink,
            report: RunReport::default(),
        }
    }

    pub fn config(&self) -> &HarnessCfg {
        &self.cfg
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub(crate) fn report_mut(&mut self) -> &mut RunReport {
        &mut self.report
    }

    pub fn monitors(&self) -> &MonitorRegistry {
        &self.monitors
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn status(&self) -> Result<AxisStatus> {
        AxisStatus::read(&self.channel, &self.pvs, self.cfg.timeouts.read)
    }

    pub fn actual_position(&self) -> Result<f64> {
        let v = self.read(PvKey::ActPosition)?;
        v.as_f64().ok_or_else(|| {
            eyre::Report::new(HarnessError::Read {
                pv: self.pvs.name(PvKey::ActPosition).to_string(),
                reason: format!("non-numeric position {v}"),
            })
        })
    }

    fn read(&self, key: PvKey) -> Result<PvValue> {
        read_pv(&self.channel, &self.pvs, key, self.cfg.timeouts.read)
    }

    fn arm(&self, key: PvKey, predicate: Predicate) -> Result<CompletionMonitor> {
        CompletionMonitor::arm(
            &self.channel,
            &self.monitors,
            self.pvs.handle(key),
            predicate,
            self.cfg.timeouts.read,
        )
    }

    /// Emit a record; a failed check becomes an `Assertion` error.
    fn check(
        &mut self,
        passed: bool,
        message: String,
        expected: impl Display,
        observed: impl Display,
    ) -> Result<()> {
        self.emit(passed, message.clone());
        if passed {
            return Ok(());
        }
        tracing::error!(%message, %expected, %observed, "assertion failed");
        Err(eyre::Report::new(HarnessError::Assertion {
            what: message,
            expected: expected.to_string(),
            observed: observed.to_string(),
        }))
    }

    pub(crate) fn emit(&mut self, passed: bool, message: String) {
        if passed {
            self.report.passed += 1;
        } else {
            self.report.failed += 1;
        }
        self.sink.record(&Record { passed, message });
    }

    /// Pulse reset, let it settle, and require a clean error flag.
    /// Records the initial actual position.
    pub fn initial_check(&mut self) -> Result<()> {
        tracing::info!("initial reset");
        self.dispatcher.dispatch(&CommandRequest::Reset)?;
        self.clock.sleep(self.cfg.pulses.reset_settle);
        let status = self.status()?;
        if status.error {
            self.emit(
                false,
                format!("Initial reset: error still set ({})", status.error_message),
            );
            return Err(eyre::Report::new(HarnessError::DomainFault {
                error_id: status.error_id,
                message: status.error_message,
            }));
        }
        self.emit(true, "Initial reset: no error, proceeding".to_string());
        tracing::info!(position = status.actual_position, "initial position");
        self.report.initial_position = Some(status.actual_position);
        Ok(())
    }

    /// Move by `offset` from the current position.
    ///
    /// With `backlash`, the setting is written (and allowed to settle) first
    /// and the reported compensation is checked against the model.
    pub fn move_relative(
        &mut self,
        offset: f64,
        min_time: f64,
        backlash: Option<BacklashConfig>,
    ) -> Result<MoveSummary> {
        if let Some(b) = &backlash {
            self.dispatcher
                .configure_backlash(b, self.cfg.pulses.backlash_settle)?;
        }
        let current = self.actual_position()?;
        let profile = compute_profile(current, offset, min_time, &self.cfg.motion);
        let expected = backlash
            .map(|b| Direction::of(offset).map_or(0.0, |d| expected_compensation(&b, d)));
        let label = match backlash {
            Some(b) => format!(
                "Move {offset:+.3} (backlash {:+.3} {})",
                b.magnitude,
                if b.enabled { "enabled" } else { "disabled" }
            ),
            None => format!("Move {offset:+.3}"),
        };
        self.move_to(&label, profile, expected)
    }

    /// Absolute move with completion, position and optional compensation checks.
    pub fn move_to(
        &mut self,
        label: &str,
        profile: MotionProfile,
        expected_compensation: Option<f64>,
    ) -> Result<MoveSummary> {
        let t = self.cfg.timeouts;
        let tol = self.cfg.tolerances;
        tracing::info!(
            label,
            target = profile.target,
            velocity = profile.velocity,
            "move start"
        );

        let done = self.arm(PvKey::Done, Predicate::RisingEdge)?;
        let trace = self.arm(PvKey::ActPosition, Predicate::Collect)?;
        self.dispatcher.dispatch(&CommandRequest::Move(profile))?;
        let outcome = done
            .wait(self.clock.as_ref(), t.move_done, t.poll)
            .into_result()
            .wrap_err_with(|| format!("{label}: waiting for move to finish"))?;
        let samples = trace.finish().numeric_series();

        let final_position = self.actual_position()?;
        self.check(
            within(final_position, profile.target, tol.position),
            format!(
                "{label}: final position {final_position:.4} within {} of target {:.4}",
                tol.position, profile.target
            ),
            profile.target,
            final_position,
        )?;

        let measured = match expected_compensation {
            Some(expected) => {
                let measured = self.read(PvKey::CurrentBacklash)?.as_f64().unwrap_or(f64::NAN);
                if expected.abs() < tol.near_zero {
                    self.check(
                        measured.abs() < tol.compensation,
                        format!("{label}: no compensation expected, measured {measured:.4}"),
                        0.0,
                        measured,
                    )?;
                } else {
                    self.check(
                        within(measured, expected, tol.compensation),
                        format!(
                            "{label}: compensation {measured:.4} matches expected {expected:.4}"
                        ),
                        expected,
                        measured,
                    )?;
                }
                Some(measured)
            }
            None => None,
        };

        let summary = MoveSummary {
            label: label.to_string(),
            target: profile.target,
            final_position,
            velocity: profile.velocity,
            n_points: samples.len(),
            n_unique: count_unique(&samples),
            expected_compensation,
            measured_compensation: measured,
            elapsed: outcome.elapsed,
        };
        tracing::info!(
            label,
            n_points = summary.n_points,
            n_unique = summary.n_unique,
            elapsed_ms = millis(summary.elapsed),
            "move complete"
        );
        self.report.moves.push(summary.clone());
        Ok(summary)
    }

    /// Home to `position` with the configured home parameters.
    pub fn home(&mut self, position: f64) -> Result<()> {
        let t = self.cfg.timeouts;
        let tol = self.cfg.tolerances.home_position;
        let request = CommandRequest::home(position, &self.cfg.home);
        self.dispatcher.dispatch(&request)?;
        // Homed drops when the command is accepted: arm after the trigger.
        let homed = self.arm(PvKey::Homed, Predicate::Level(PvValue::Bool(true)))?;
        homed
            .wait(self.clock.as_ref(), t.home, t.poll)
            .into_result()
            .wrap_err_with(|| format!("home to {position:.3}"))?;
        let final_position = self.actual_position()?;
        self.check(
            within(final_position, position, tol),
            format!("Home to {position:.3}: final position {final_position:.4} within {tol}"),
            position,
            final_position,
        )
    }

    /// Start a move by `offset` and interrupt it once busy.
    pub fn interrupt_move(&mut self, offset: f64, min_time: f64, kind: Interrupt) -> Result<()> {
        let current = self.actual_position()?;
        let profile = compute_profile(current, offset, min_time, &self.cfg.motion);
        let timing = InterruptTiming {
            lead: self.cfg.pulses.busy_lead,
            busy_timeout: self.cfg.timeouts.busy,
            dwell: Duration::ZERO,
        };
        self.interrupt(
            &format!("Move {offset:+.3} with {kind}"),
            CommandRequest::Move(profile),
            kind,
            timing,
        )
    }

    /// Select `state` and interrupt the resulting motion once busy.
    ///
    /// The pulse goes out `pulses.state_dwell` after busy, so the axis is
    /// moving when it is interrupted.
    pub fn interrupt_state(&mut self, state: i64, kind: Interrupt) -> Result<()> {
        let timing = InterruptTiming {
            lead: Duration::ZERO,
            busy_timeout: self.cfg.timeouts.state_busy,
            dwell: self.cfg.pulses.state_dwell,
        };
        self.interrupt(
            &format!("State {state} with {kind}"),
            CommandRequest::StateSet(state),
            kind,
            timing,
        )
    }

    fn interrupt(
        &mut self,
        label: &str,
        start: CommandRequest,
        kind: Interrupt,
        timing: InterruptTiming,
    ) -> Result<()> {
        let t = self.cfg.timeouts;
        tracing::info!(label, ?timing, "interrupt test");
        let busy = self.arm(PvKey::Busy, Predicate::Level(PvValue::Bool(true)))?;
        let done = self.arm(PvKey::Done, Predicate::RisingEdge)?;
        self.dispatcher.dispatch(&start)?;
        self.clock.sleep(timing.lead);

        if !busy.wait(self.clock.as_ref(), timing.busy_timeout, t.poll).satisfied {
            self.emit(false, format!("{label}: axis never went busy"));
            return Err(eyre::Report::new(HarnessError::NeverBusy {
                timeout_ms: millis(timing.busy_timeout),
            }));
        }
        self.clock.sleep(timing.dwell);

        let pulse = match kind {
            Interrupt::Halt => CommandRequest::Halt,
            Interrupt::Reset => CommandRequest::Reset,
        };
        self.dispatcher.dispatch(&pulse)?;
        done.wait(self.clock.as_ref(), t.interrupt_done, t.poll)
            .into_result()
            .wrap_err_with(|| format!("{label}: waiting for done"))?;
        let done_now = self.read(PvKey::Done)?.is_truthy();
        self.check(
            done_now,
            format!("{label}: done set after {kind}"),
            1,
            u8::from(done_now),
        )
    }

    /// Select `state` and wait for the move to finish.
    pub fn state_move(&mut self, state: i64) -> Result<()> {
        let t = self.cfg.timeouts;
        let done = self.arm(PvKey::Done, Predicate::RisingEdge)?;
        self.dispatcher.dispatch(&CommandRequest::StateSet(state))?;
        done.wait(self.clock.as_ref(), t.state_move, t.poll)
            .into_result()
            .wrap_err_with(|| format!("move to state {state}"))?;
        let position = self.actual_position()?;
        self.emit(true, format!("State {state}: move done at {position:.4}"));
        Ok(())
    }

    /// Request an unknown state, expect the error flag, then recover with a reset.
    pub fn unknown_state(&mut self, state: i64) -> Result<()> {
        let t = self.cfg.timeouts;
        let error_set = self.arm(PvKey::Error, Predicate::Level(PvValue::Bool(true)))?;
        self.dispatcher.dispatch(&CommandRequest::StateSet(state))?;
        let outcome = error_set.wait(self.clock.as_ref(), t.error_set, t.poll);
        let observed = outcome
            .observed
            .map_or_else(|| "none".to_string(), |v| v.to_string());
        self.check(
            outcome.satisfied,
            format!("State {state}: error flag set for unknown state"),
            1,
            observed,
        )?;
        let status = self.status()?;
        tracing::info!(
            error_id = status.error_id,
            message = %status.error_message,
            "controller fault raised"
        );

        self.dispatcher.dispatch(&CommandRequest::Reset)?;
        let error_clear = self.arm(PvKey::Error, Predicate::Level(PvValue::Bool(false)))?;
        if !error_clear
            .wait(self.clock.as_ref(), t.error_clear, t.poll)
            .satisfied
        {
            let status = self.status()?;
            self.emit(
                false,
                format!("State {state}: error still set after reset ({})", status.error_message),
            );
            return Err(eyre::Report::new(HarnessError::DomainFault {
                error_id: status.error_id,
                message: status.error_message,
            }));
        }
        self.emit(true, "Error/fault recovered after reset".to_string());
        Ok(())
    }
}
