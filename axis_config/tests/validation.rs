use axis_config::{load_symbols, load_toml, parse_symbols};
use rstest::rstest;
use std::io::Write;

#[test]
fn empty_file_yields_valid_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults should pass");
    assert_eq!(cfg.pvs.done, "bDone_RBV");
    assert_eq!(cfg.timeouts.home, 14_000);
    assert!((cfg.tolerances.position - 0.03).abs() < f64::EPSILON);
    assert_eq!(cfg.batch.interrupt_offsets, vec![10.0, -10.0, 15.0, -15.0]);
}

#[test]
fn partial_sections_keep_other_defaults() {
    let toml = r#"
[motion]
min_time_s = 1.0

[pvs]
done = "bMoveDone_RBV"

[timeouts]
busy = 500
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.pvs.done, "bMoveDone_RBV");
    assert_eq!(cfg.pvs.busy, "bBusy_RBV");
    assert_eq!(cfg.timeouts.busy, 500);
    assert_eq!(cfg.timeouts.move_done, 10_000);
    assert!((cfg.motion.max_velocity - 2200.0).abs() < f64::EPSILON);
}

#[rstest]
#[case("[motion]\nmin_time_s = 0.0", "motion.min_time_s must be > 0")]
#[case("[motion]\nmin_velocity = 50.0\nmax_velocity = 20.0", "motion.min_velocity must be <= motion.max_velocity")]
#[case("[tolerances]\nposition = -0.1", "tolerances.position must be > 0")]
#[case("[timeouts]\npoll = 0", "timeouts.poll must be >= 1")]
#[case("[timeouts]\npoll = 20000", "timeouts.poll must not exceed")]
#[case("[pvs]\nhalt = \"  \"", "pvs.halt must not be empty")]
#[case("[batch]\nbacklash_offset_min = 20.0\nbacklash_offset_max = 10.0", "batch.backlash_offset_max")]
#[case("[batch]\nnum_halt = 1\ninterrupt_offsets = []", "batch.interrupt_offsets must not be empty")]
#[case("[states]\ncount = 0", "states.count must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation")]
#[case("[sim]\ntick_ms = 0", "sim.tick_ms must be >= 1")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(format!("{err}").contains(needle), "got: {err}");
}

#[test]
fn wrong_type_is_a_parse_error() {
    assert!(load_toml("[timeouts]\nbusy = \"soon\"").is_err());
}

#[test]
fn symbols_load_from_file() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(
        f,
        r#"[
  {{ "name": "Main.stM1", "base_type": "ST_MotionStage", "pragmas": {{ "axis-link": "Axis1" }} }},
  {{ "name": "Main.astStages", "base_type": "ST_MotionStage",
     "pragmas": {{ "axis-link": "Axis" }}, "array": {{ "lbound": 1, "elements": 3 }} }}
]"#
    )
    .unwrap();
    let syms = load_symbols(f.path()).expect("load symbols");
    assert_eq!(syms.len(), 2);
    assert_eq!(syms[0].pragmas.get("axis-link").map(String::as_str), Some("Axis1"));
    assert!(syms[0].array.is_none());
    assert_eq!(syms[1].array.map(|a| a.elements), Some(3));
}

#[test]
fn malformed_symbols_are_rejected() {
    let err = parse_symbols(r#"[{ "name": "x" }]"#).expect_err("base_type missing");
    assert!(format!("{err}").contains("invalid symbol file"));
}
