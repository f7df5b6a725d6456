#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod run;

use std::path::Path;

use axis_config::{Config, Logging};
use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, RunArgs};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::{PlanKind, run_plan};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        let code = exit_code_for_error(&e);
        tracing::error!(error = %format!("{e:#}"), code, "run failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(code);
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let mut cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg.logging)?;

    match cli.cmd {
        Commands::Sequence { run } => {
            apply_run_overrides(&mut cfg, &run);
            finish(run_plan(&PlanKind::Sequence, &cfg, &run, cli.json))
        }
        Commands::Bulk {
            run,
            num_moves,
            num_backlash,
            num_halt,
            num_reset,
            num_home,
        } => {
            apply_run_overrides(&mut cfg, &run);
            let b = &mut cfg.batch;
            for (slot, v) in [
                (&mut b.num_moves, num_moves),
                (&mut b.num_backlash, num_backlash),
                (&mut b.num_halt, num_halt),
                (&mut b.num_reset, num_reset),
                (&mut b.num_home, num_home),
            ] {
                if let Some(v) = v {
                    *slot = v;
                }
            }
            finish(run_plan(&PlanKind::Bulk, &cfg, &run, cli.json))
        }
        Commands::States {
            run,
            state_count,
            interrupt_rounds,
            num_moves,
        } => {
            apply_run_overrides(&mut cfg, &run);
            if let Some(n) = state_count {
                cfg.states.count = n;
            }
            if let Some(n) = interrupt_rounds {
                cfg.states.interrupt_rounds = n;
            }
            if let Some(n) = num_moves {
                cfg.batch.num_moves = n;
            }
            finish(run_plan(&PlanKind::States, &cfg, &run, cli.json))
        }
        Commands::Links { symbols } => print_links(&symbols, cli.json),
    }
}

fn finish(result: Result<axis_core::RunReport>) -> Result<()> {
    let report = result?;
    tracing::info!(
        passed = report.passed,
        scenarios = report.scenarios_completed,
        "all scenarios passed"
    );
    Ok(())
}

/// Read and validate the config; a missing file means built-in defaults.
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = axis_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("invalid configuration in {}: {e}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    Ok(cfg)
}

fn apply_run_overrides(cfg: &mut Config, run: &RunArgs) {
    if let Some(t) = run.avg_motion_time {
        cfg.batch.avg_motion_time = t;
    }
}

/// Console logs go to stderr so stdout carries only records and the summary.
fn init_tracing(cli: &Cli, logging: &Logging) -> Result<()> {
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        cli.log_level
            .clone()
            .or_else(|| logging.level.clone())
            .unwrap_or_else(|| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file = match &logging.file {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file must name a file: {file}"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

fn print_links(path: &Path, json_mode: bool) -> Result<()> {
    let symbols = axis_config::load_symbols(path)?;
    let out = axis_core::links::extract_links(&symbols);
    for s in &out.skipped {
        eprintln!("warning: {s}");
    }
    if json_mode {
        let links: Vec<_> = out
            .links
            .iter()
            .map(|l| serde_json::json!({ "stage": l.stage, "axis": l.axis }))
            .collect();
        println!("{}", serde_json::Value::Array(links));
    } else {
        print!("{}", axis_core::links::format_table(&out.links));
    }
    Ok(())
}
