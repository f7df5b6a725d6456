use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

const FAST: &str = r#"
[timeouts]
connect = 100
move_done = 500
busy = 300
poll = 5

[pulses]
hold = 10
reset_settle = 10
backlash_settle = 5
busy_lead = 5
state_dwell = 5

[sim]
time_scale = 0.01
min_busy_ms = 30
tick_ms = 2
"#;

#[rstest]
#[case::passing(None, 0, true)]
#[case::failing(Some("never-done"), 4, false)]
fn report_is_written_either_way(
    #[case] fault: Option<&str>,
    #[case] code: i32,
    #[case] success: bool,
) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, format!("{FAST}\n[batch]\nnum_moves = 2\nnum_backlash = 1\n")).unwrap();
    let report = dir.path().join("out.json");

    let mut cmd = Command::cargo_bin("axis_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["bulk", "--motor", "SIM:m1:", "--seed", "11", "--report"])
        .arg(&report);
    if let Some(f) = fault {
        cmd.env("AXIS_SIM_FAULT", f);
    }
    cmd.assert().code(code);

    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(v["success"], success);
    assert_eq!(v["seed"], 11);
    assert_eq!(v["scenarios_total"], 3);
    assert!(!report.with_extension("tmp").exists());
}
