//! Scenario runs: backend assembly, plan selection, record output and the summary.

use std::sync::Arc;
use std::time::Duration;

use axis_channel::{SimChannel, SimFault, SimLayout, SimOptions};
use axis_config::Config;
use axis_core::{
    BatchPlan, Harness, MoveSummary, Plan, PvKey, PvNames, Record, RecordSink, RunReport,
    StatesPlan,
};
use axis_core::{ConsoleSink, Result};
use axis_traits::Channel;
use eyre::WrapErr;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;

use crate::cli::RunArgs;

/// Test hook: overrides `[sim] time_scale`.
const ENV_SIM_TIME_SCALE: &str = "AXIS_SIM_TIME_SCALE";
/// Test hook: injects a simulator fault, e.g. `never-busy` or `reject:bHalt`.
const ENV_SIM_FAULT: &str = "AXIS_SIM_FAULT";

/// Which plan to run, with CLI overrides already applied to `Config`.
pub enum PlanKind {
    Sequence,
    Bulk,
    States,
}

/// Prints each record as one JSON object per line.
struct JsonSink;

impl RecordSink for JsonSink {
    fn record(&self, rec: &Record) {
        println!(
            "{}",
            json!({ "type": "record", "passed": rec.passed, "message": rec.message })
        );
    }
}

fn sim_layout(names: &PvNames) -> SimLayout {
    let pv = |key| names.get(key).to_string();
    SimLayout {
        move_cmd: pv(PvKey::MoveCmd),
        home_cmd: pv(PvKey::HomeCmd),
        reset: pv(PvKey::Reset),
        halt: pv(PvKey::Halt),
        position: pv(PvKey::Position),
        home_position: pv(PvKey::HomePosition),
        velocity: pv(PvKey::Velocity),
        acceleration: pv(PvKey::Acceleration),
        deceleration: pv(PvKey::Deceleration),
        cmd_data: pv(PvKey::CmdData),
        command: pv(PvKey::Command),
        backlash_enable: pv(PvKey::BacklashEnable),
        backlash: pv(PvKey::Backlash),
        act_position: pv(PvKey::ActPosition),
        done: pv(PvKey::Done),
        busy: pv(PvKey::Busy),
        error: pv(PvKey::Error),
        error_id: pv(PvKey::ErrorId),
        homed: pv(PvKey::Homed),
        error_message: pv(PvKey::ErrorMessage),
        backlash_status: pv(PvKey::BacklashStatus),
        current_backlash: pv(PvKey::CurrentBacklash),
        state_set: pv(PvKey::StateSet),
    }
}

/// Simulated controller serving the configured PV names under `prefix`.
pub fn sim_channel(prefix: &str, cfg: &Config) -> Result<SimChannel> {
    let mut time_scale = cfg.sim.time_scale;
    if let Ok(v) = std::env::var(ENV_SIM_TIME_SCALE) {
        time_scale = v
            .parse()
            .wrap_err_with(|| format!("{ENV_SIM_TIME_SCALE}={v} is not a number"))?;
    }
    let fault = match std::env::var(ENV_SIM_FAULT) {
        Ok(spec) if !spec.is_empty() => Some(
            spec.parse::<SimFault>()
                .wrap_err_with(|| format!("{ENV_SIM_FAULT}={spec}"))?,
        ),
        _ => None,
    };
    let options = SimOptions {
        time_scale,
        tick: Duration::from_millis(cfg.sim.tick_ms),
        min_busy: Duration::from_millis(cfg.sim.min_busy_ms),
        notify_latency: Duration::from_millis(cfg.sim.notify_latency_ms),
        state_count: cfg.states.count,
        state_spacing: cfg.sim.state_spacing,
        state_velocity: cfg.sim.state_velocity,
        fault,
        ..SimOptions::default()
    };
    tracing::info!(
        prefix,
        time_scale,
        fault = ?options.fault,
        "using simulated axis controller"
    );
    Ok(SimChannel::new(
        sim_layout(&PvNames::new(prefix, &cfg.pvs)),
        options,
    ))
}

fn build_plan(kind: &PlanKind, cfg: &Config, seed: u64) -> Plan {
    let mut rng = StdRng::seed_from_u64(seed);
    match kind {
        PlanKind::Sequence => Plan::sequence(cfg.batch.avg_motion_time),
        PlanKind::Bulk => Plan::bulk(&BatchPlan::from(cfg), &mut rng),
        PlanKind::States => Plan::states(&StatesPlan::from(cfg), &mut rng),
    }
}

/// Run one plan against the axis under `args.motor` and print the summary.
///
/// The summary (and `--report` file) is produced whether or not the run passed.
pub fn run_plan(kind: &PlanKind, cfg: &Config, args: &RunArgs, json_mode: bool) -> Result<RunReport> {
    cfg.validate()
        .wrap_err("invalid configuration after command-line overrides")?;
    let seed = args.seed.unwrap_or_else(rand::random);
    let plan = build_plan(kind, cfg, seed);
    tracing::info!(seed, scenarios = plan.len(), motor = %args.motor, "plan ready");

    let channel: Arc<dyn Channel> = Arc::new(sim_channel(&args.motor, cfg)?);
    let sink: Box<dyn RecordSink> = if json_mode {
        Box::new(JsonSink)
    } else {
        Box::new(ConsoleSink)
    };
    let mut harness = Harness::builder()
        .with_channel(channel)
        .with_prefix(args.motor.clone())
        .with_file_config(cfg)
        .with_sink(sink)
        .build()?;

    let result = harness.run(&plan);
    let report = harness.report();
    let summary = summary_json(report, seed, plan.len());
    if json_mode {
        println!("{summary}");
    } else {
        print_summary(report, seed, plan.len());
    }
    if let Some(path) = &args.report {
        let bytes = serde_json::to_vec_pretty(&summary)?;
        axis_core::atomic::write_atomic(path, &bytes)
            .wrap_err_with(|| format!("write report {}", path.display()))?;
        tracing::info!(path = %path.display(), "report written");
    }
    result
}

fn move_json(m: &MoveSummary) -> serde_json::Value {
    json!({
        "label": m.label,
        "target": m.target,
        "final_position": m.final_position,
        "velocity": m.velocity,
        "n_points": m.n_points,
        "n_unique": m.n_unique,
        "expected_compensation": m.expected_compensation,
        "measured_compensation": m.measured_compensation,
        "elapsed_ms": axis_core::util::millis(m.elapsed),
    })
}

pub fn summary_json(report: &RunReport, seed: u64, total: usize) -> serde_json::Value {
    json!({
        "type": "summary",
        "success": report.is_success(),
        "seed": seed,
        "passed": report.passed,
        "failed": report.failed,
        "scenarios_completed": report.scenarios_completed,
        "scenarios_total": total,
        "initial_position": report.initial_position,
        "elapsed_ms": axis_core::util::millis(report.elapsed),
        "failure": report.failure,
        "moves": report.moves.iter().map(move_json).collect::<Vec<_>>(),
    })
}

fn print_summary(report: &RunReport, seed: u64, total: usize) {
    println!();
    println!(
        "Summary: {} passed, {} failed, {}/{} scenarios in {:.1} s (seed {seed})",
        report.passed,
        report.failed,
        report.scenarios_completed,
        total,
        report.elapsed.as_secs_f64()
    );
    if let Some(p) = report.initial_position {
        println!("  initial position: {p:.4}");
    }
    for m in &report.moves {
        println!(
            "  {}: target {:.4}, final {:.4}, {} points ({} unique)",
            m.label, m.target, m.final_position, m.n_points, m.n_unique
        );
    }
}
