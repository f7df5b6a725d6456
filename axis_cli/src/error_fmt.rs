//! Human-readable error descriptions, exit codes and structured JSON errors.

use axis_core::{BuildError, HarnessError};
use serde_json::json;

/// First `HarnessError` in the chain; context added with `wrap_err` sits on top.
fn harness_error(err: &eyre::Report) -> Option<&HarnessError> {
    err.chain().find_map(|c| c.downcast_ref::<HarnessError>())
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.chain().find_map(|c| c.downcast_ref::<BuildError>()) {
        return match be {
            BuildError::MissingChannel | BuildError::MissingPrefix => format!(
                "What happened: The harness could not be assembled ({be}).\nLikely causes: Internal wiring error.\nHow to fix: Re-run with --log-level=debug and report the output."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(he) = harness_error(err) {
        return match he {
            HarnessError::Connection { pv, .. } => format!(
                "What happened: PV {pv} did not connect.\nLikely causes: Wrong --motor prefix, IOC not running, or a renamed PV suffix.\nHow to fix: Check the prefix and the [pvs] suffixes, and that the IOC is reachable. Raise timeouts.connect if it is slow."
            ),
            HarnessError::CommandWrite { pv, reason } => format!(
                "What happened: Writing {pv} failed ({reason}).\nLikely causes: PV is read-only, access security denies the write, or the IOC is overloaded.\nHow to fix: Check write access to {pv}; raise timeouts.write if the IOC is slow."
            ),
            HarnessError::Read { pv, reason } => format!(
                "What happened: Reading {pv} failed ({reason}).\nLikely causes: The PV disconnected during the run.\nHow to fix: Check the IOC and network, then rerun."
            ),
            HarnessError::WaitTimeout {
                condition,
                elapsed_ms,
            } => format!(
                "What happened: Timed out after {elapsed_ms} ms waiting for {condition}.\nLikely causes: Axis stalled, limit switch hit, or the move takes longer than the configured timeout.\nHow to fix: Check the axis state on the controller; raise the matching [timeouts] entry for long moves."
            ),
            HarnessError::NeverBusy { timeout_ms } => format!(
                "What happened: The axis never went busy within {timeout_ms} ms after the move was started.\nLikely causes: Move command ignored, axis disabled, or an error already latched.\nHow to fix: Check the axis enable and error state, then rerun. Raise timeouts.busy for slow controllers."
            ),
            HarnessError::Assertion {
                what,
                expected,
                observed,
            } => format!(
                "What happened: Check failed: {what}.\nExpected: {expected}\nObserved: {observed}\nHow to fix: Inspect the axis tuning and encoder scaling, or widen [tolerances] if the deviation is acceptable."
            ),
            HarnessError::DomainFault { error_id, message } => format!(
                "What happened: The controller reports error {error_id} ({message}) that a reset did not clear.\nLikely causes: Hardware fault, drive error, or a latched limit.\nHow to fix: Clear the fault on the controller, then rerun."
            ),
            HarnessError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    // String-based heuristics for errors coming from config or startup
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") || lower.contains(" must be ") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range or empty values in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    if lower.contains("symbol file") {
        return format!(
            "What happened: {msg}.\nLikely causes: Wrong path or a file that is not a JSON symbol list.\nHow to fix: Export the symbols as a JSON array of {{name, base_type, pragmas, array}} objects."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable name of the failure kind, used in JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    match harness_error(err) {
        Some(HarnessError::Connection { .. }) => "Connection",
        Some(HarnessError::CommandWrite { .. }) => "CommandWrite",
        Some(HarnessError::Read { .. }) => "Read",
        Some(HarnessError::WaitTimeout { .. }) => "WaitTimeout",
        Some(HarnessError::NeverBusy { .. }) => "NeverBusy",
        Some(HarnessError::Assertion { .. }) => "Assertion",
        Some(HarnessError::DomainFault { .. }) => "DomainFault",
        Some(HarnessError::Config(_)) => "Config",
        None => "Error",
    }
}

/// Map the failure kind to a stable exit code; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match harness_error(err) {
        Some(HarnessError::Connection { .. }) => 2,
        Some(HarnessError::CommandWrite { .. }) => 3,
        Some(HarnessError::WaitTimeout { .. }) => 4,
        Some(HarnessError::NeverBusy { .. }) => 5,
        Some(HarnessError::Assertion { .. }) => 6,
        Some(HarnessError::DomainFault { .. }) => 7,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    let details = match harness_error(err) {
        Some(HarnessError::Connection { pv, .. } | HarnessError::CommandWrite { pv, .. }) => {
            Some(json!({ "pv": pv }))
        }
        Some(HarnessError::WaitTimeout {
            condition,
            elapsed_ms,
        }) => Some(json!({ "condition": condition, "elapsed_ms": elapsed_ms })),
        Some(HarnessError::NeverBusy { timeout_ms }) => Some(json!({ "timeout_ms": timeout_ms })),
        Some(HarnessError::Assertion {
            what,
            expected,
            observed,
        }) => Some(json!({ "check": what, "expected": expected, "observed": observed })),
        Some(HarnessError::DomainFault { error_id, message }) => {
            Some(json!({ "error_id": error_id, "controller_message": message }))
        }
        _ => None,
    };

    let mut obj = json!({
        "type": "error",
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    if let (Some(d), Some(map)) = (details, obj.as_object_mut()) {
        map.insert("details".to_string(), d);
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    fn wrapped(e: HarnessError) -> eyre::Report {
        Err::<(), _>(eyre::Report::new(e))
            .wrap_err("scenario context")
            .unwrap_err()
    }

    #[test]
    fn exit_codes_see_through_context() {
        let cases = [
            (
                HarnessError::Connection {
                    pv: "A".into(),
                    reason: "x".into(),
                },
                2,
            ),
            (
                HarnessError::CommandWrite {
                    pv: "A".into(),
                    reason: "x".into(),
                },
                3,
            ),
            (
                HarnessError::WaitTimeout {
                    condition: "c".into(),
                    elapsed_ms: 5,
                },
                4,
            ),
            (HarnessError::NeverBusy { timeout_ms: 4000 }, 5),
            (
                HarnessError::Assertion {
                    what: "w".into(),
                    expected: "1".into(),
                    observed: "2".into(),
                },
                6,
            ),
            (
                HarnessError::DomainFault {
                    error_id: 1,
                    message: "m".into(),
                },
                7,
            ),
        ];
        for (e, code) in cases {
            assert_eq!(exit_code_for_error(&wrapped(e)), code);
        }
        assert_eq!(exit_code_for_error(&eyre::eyre!("plain")), 1);
    }

    #[test]
    fn error_json_carries_details() {
        let err = wrapped(HarnessError::NeverBusy { timeout_ms: 300 });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "NeverBusy");
        assert_eq!(v["exit_code"], 5);
        assert_eq!(v["details"]["timeout_ms"], 300);
        assert!(v["message"].as_str().unwrap().contains("never went busy"));
    }
}
