#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the axis harness.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section is optional; an empty file yields the stock defaults.
//! - Symbol files (JSON) feed the axis-link extraction tool.
use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

/// PV suffixes appended to the motor prefix.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PvSuffixes {
    pub move_cmd: String,
    pub home_cmd: String,
    pub reset: String,
    pub halt: String,
    pub position: String,
    pub home_position: String,
    pub velocity: String,
    pub acceleration: String,
    pub deceleration: String,
    pub cmd_data: String,
    pub command: String,
    pub backlash_enable: String,
    pub backlash: String,
    pub act_position: String,
    pub done: String,
    pub busy: String,
    pub error: String,
    pub error_id: String,
    pub homed: String,
    pub error_message: String,
    pub backlash_status: String,
    pub current_backlash: String,
    pub state_set: String,
}

impl Default for PvSuffixes {
    fn default() -> Self {
        Self {
            move_cmd: "MoveCmd".into(),
            home_cmd: "HomeCmd".into(),
            reset: "bReset".into(),
            halt: "bHalt".into(),
            position: "fPosition".into(),
            home_position: "fHomePosition".into(),
            velocity: "fVelocity".into(),
            acceleration: "fAcceleration".into(),
            deceleration: "fDeceleration".into(),
            cmd_data: "nCmdData".into(),
            command: "nCommand".into(),
            backlash_enable: "bBacklashEnable".into(),
            backlash: "fBacklash".into(),
            act_position: "fActPosition_RBV".into(),
            done: "bDone_RBV".into(),
            busy: "bBusy_RBV".into(),
            error: "bError_RBV".into(),
            error_id: "nErrorId_RBV".into(),
            homed: "bHomed_RBV".into(),
            error_message: "sErrorMessage_RBV".into(),
            backlash_status: "bBacklashStatus_RBV".into(),
            current_backlash: "fCurrentBacklash_RBV".into(),
            state_set: "STATES:SET".into(),
        }
    }
}

impl PvSuffixes {
    /// `(key, suffix)` pairs, used for validation and diagnostics.
    pub fn entries(&self) -> [(&'static str, &str); 23] {
        [
            ("move_cmd", &self.move_cmd),
            ("home_cmd", &self.home_cmd),
            ("reset", &self.reset),
            ("halt", &self.halt),
            ("position", &self.position),
            ("home_position", &self.home_position),
            ("velocity", &self.velocity),
            ("acceleration", &self.acceleration),
            ("deceleration", &self.deceleration),
            ("cmd_data", &self.cmd_data),
            ("command", &self.command),
            ("backlash_enable", &self.backlash_enable),
            ("backlash", &self.backlash),
            ("act_position", &self.act_position),
            ("done", &self.done),
            ("busy", &self.busy),
            ("error", &self.error),
            ("error_id", &self.error_id),
            ("homed", &self.homed),
            ("error_message", &self.error_message),
            ("backlash_status", &self.backlash_status),
            ("current_backlash", &self.current_backlash),
            ("state_set", &self.state_set),
        ]
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MotionCfg {
    /// Shortest time a move should take; velocity is derived from it.
    pub min_time_s: f64,
    pub min_velocity: f64,
    pub max_velocity: f64,
    pub max_acceleration: f64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            min_time_s: 2.5,
            min_velocity: 15.0,
            max_velocity: 2200.0,
            max_acceleration: 15000.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HomeCfg {
    pub velocity: f64,
    pub acceleration: f64,
    pub deceleration: f64,
    /// Homing mode written to the command-data PV.
    pub mode: i64,
    /// Random home targets are drawn from `[-position_range, position_range]`.
    pub position_range: f64,
}

impl Default for HomeCfg {
    fn default() -> Self {
        Self {
            velocity: 50.0,
            acceleration: 100.0,
            deceleration: 100.0,
            mode: 1,
            position_range: 25.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Tolerances {
    pub position: f64,
    pub home_position: f64,
    pub compensation: f64,
    /// Expected compensation below this is treated as "no compensation".
    pub near_zero: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            position: 0.03,
            home_position: 0.05,
            compensation: 0.01,
            near_zero: 0.001,
        }
    }
}

/// Timeouts in milliseconds.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Timeouts {
    pub connect: u64,
    pub write: u64,
    pub read: u64,
    pub move_done: u64,
    pub busy: u64,
    pub home: u64,
    pub interrupt_done: u64,
    pub error_set: u64,
    pub error_clear: u64,
    pub state_move: u64,
    /// Busy wait before interrupting a state move.
    pub state_busy: u64,
    /// Poll cadence of completion waits.
    pub poll: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: 2000,
            write: 1000,
            read: 1000,
            move_done: 10_000,
            busy: 4000,
            home: 14_000,
            interrupt_done: 10_000,
            error_set: 2000,
            error_clear: 6000,
            state_move: 10_000,
            state_busy: 7000,
            poll: 100,
        }
    }
}

/// Pulse and settle times in milliseconds.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Pulses {
    pub hold: u64,
    pub reset_settle: u64,
    pub backlash_settle: u64,
    /// Delay between the move trigger and the halt/reset pulse.
    pub busy_lead: u64,
    /// Time a state move keeps running after busy, before the halt/reset pulse.
    pub state_dwell: u64,
}

impl Default for Pulses {
    fn default() -> Self {
        Self {
            hold: 250,
            reset_settle: 300,
            backlash_settle: 300,
            busy_lead: 300,
            state_dwell: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatchCfg {
    pub num_moves: u32,
    pub num_backlash: u32,
    pub num_halt: u32,
    pub num_reset: u32,
    pub num_home: u32,
    /// Magnitude of normal moves; the sign alternates.
    pub offset: f64,
    pub avg_motion_time: f64,
    pub backlash_magnitude: f64,
    pub backlash_offset_min: f64,
    pub backlash_offset_max: f64,
    pub interrupt_offsets: Vec<f64>,
}

impl Default for BatchCfg {
    fn default() -> Self {
        Self {
            num_moves: 5,
            num_backlash: 5,
            num_halt: 0,
            num_reset: 0,
            num_home: 0,
            offset: 15.0,
            avg_motion_time: 2.5,
            backlash_magnitude: 1.7,
            backlash_offset_min: 10.0,
            backlash_offset_max: 20.0,
            interrupt_offsets: vec![10.0, -10.0, 15.0, -15.0],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StatesCfg {
    pub count: i64,
    pub interrupt_rounds: u32,
}

impl Default for StatesCfg {
    fn default() -> Self {
        Self {
            count: 15,
            interrupt_rounds: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Tuning for the simulated backend only.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    pub time_scale: f64,
    pub min_busy_ms: u64,
    pub tick_ms: u64,
    pub state_spacing: f64,
    pub state_velocity: f64,
    pub notify_latency_ms: u64,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            min_busy_ms: 200,
            tick_ms: 5,
            state_spacing: 10.0,
            state_velocity: 50.0,
            notify_latency_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub pvs: PvSuffixes,
    pub motion: MotionCfg,
    pub home: HomeCfg,
    pub tolerances: Tolerances,
    pub timeouts: Timeouts,
    pub pulses: Pulses,
    pub batch: BatchCfg,
    pub states: StatesCfg,
    pub logging: Logging,
    pub sim: SimCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn positive(key: &str, v: f64) -> eyre::Result<()> {
    if !(v.is_finite() && v > 0.0) {
        eyre::bail!("{key} must be > 0");
    }
    Ok(())
}

fn non_negative(key: &str, v: f64) -> eyre::Result<()> {
    if !(v.is_finite() && v >= 0.0) {
        eyre::bail!("{key} must be >= 0");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // PVs
        for (key, suffix) in self.pvs.entries() {
            if suffix.trim().is_empty() {
                eyre::bail!("pvs.{key} must not be empty");
            }
        }

        // Motion
        positive("motion.min_time_s", self.motion.min_time_s)?;
        positive("motion.min_velocity", self.motion.min_velocity)?;
        positive("motion.max_velocity", self.motion.max_velocity)?;
        positive("motion.max_acceleration", self.motion.max_acceleration)?;
        if self.motion.min_velocity > self.motion.max_velocity {
            eyre::bail!("motion.min_velocity must be <= motion.max_velocity");
        }

        // Home
        positive("home.velocity", self.home.velocity)?;
        positive("home.acceleration", self.home.acceleration)?;
        positive("home.deceleration", self.home.deceleration)?;
        non_negative("home.position_range", self.home.position_range)?;

        // Tolerances
        positive("tolerances.position", self.tolerances.position)?;
        positive("tolerances.home_position", self.tolerances.home_position)?;
        positive("tolerances.compensation", self.tolerances.compensation)?;
        non_negative("tolerances.near_zero", self.tolerances.near_zero)?;

        // Timeouts
        let t = &self.timeouts;
        for (key, ms) in [
            ("connect", t.connect),
            ("write", t.write),
            ("read", t.read),
            ("move_done", t.move_done),
            ("busy", t.busy),
            ("home", t.home),
            ("interrupt_done", t.interrupt_done),
            ("error_set", t.error_set),
            ("error_clear", t.error_clear),
            ("state_move", t.state_move),
            ("state_busy", t.state_busy),
            ("poll", t.poll),
        ] {
            if ms == 0 {
                eyre::bail!("timeouts.{key} must be >= 1");
            }
        }
        if t.poll > t.move_done {
            eyre::bail!("timeouts.poll must not exceed timeouts.move_done");
        }

        // Batch
        positive("batch.offset", self.batch.offset)?;
        positive("batch.avg_motion_time", self.batch.avg_motion_time)?;
        positive("batch.backlash_magnitude", self.batch.backlash_magnitude)?;
        non_negative("batch.backlash_offset_min", self.batch.backlash_offset_min)?;
        if self.batch.backlash_offset_max < self.batch.backlash_offset_min {
            eyre::bail!("batch.backlash_offset_max must be >= batch.backlash_offset_min");
        }
        if self.batch.num_halt + self.batch.num_reset > 0 && self.batch.interrupt_offsets.is_empty()
        {
            eyre::bail!("batch.interrupt_offsets must not be empty when halt/reset tests are requested");
        }
        if self.batch.interrupt_offsets.iter().any(|o| *o == 0.0 || !o.is_finite()) {
            eyre::bail!("batch.interrupt_offsets entries must be non-zero");
        }

        // States
        if self.states.count < 1 {
            eyre::bail!("states.count must be >= 1");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Sim
        positive("sim.time_scale", self.sim.time_scale)?;
        if self.sim.tick_ms == 0 {
            eyre::bail!("sim.tick_ms must be >= 1");
        }
        positive("sim.state_spacing", self.sim.state_spacing)?;
        positive("sim.state_velocity", self.sim.state_velocity)?;

        Ok(())
    }
}

/// Array shape of a declared symbol.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ArrayInfo {
    pub lbound: i64,
    pub elements: u32,
}

/// One declared PLC symbol as exported from a project file.
///
/// ```json
/// { "name": "Main.fbStages", "base_type": "ST_MotionStage",
///   "pragmas": { "axis-link": "GVL.astAxes[$INDEX$]" },
///   "array": { "lbound": 1, "elements": 4 } }
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SymbolEntry {
    pub name: String,
    pub base_type: String,
    #[serde(default)]
    pub pragmas: BTreeMap<String, String>,
    #[serde(default)]
    pub array: Option<ArrayInfo>,
}

pub fn parse_symbols(s: &str) -> eyre::Result<Vec<SymbolEntry>> {
    serde_json::from_str(s).map_err(|e| eyre::eyre!("invalid symbol file: {e}"))
}

pub fn load_symbols(path: &Path) -> eyre::Result<Vec<SymbolEntry>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("open symbol file {:?}: {}", path, e))?;
    parse_symbols(&text)
}
