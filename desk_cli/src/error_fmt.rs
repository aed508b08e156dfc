//! Human-readable error descriptions and structured JSON error formatting.

use desk_core::error::{BuildError, DeskError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTransport => {
                "What happened: No transport was provided to the controller.\nLikely causes: The link backend failed to initialize or was not wired into the builder.\nHow to fix: Pass a transport via with_transport(...).".to_string()
            }
            BuildError::MissingCalibration => {
                "What happened: Calibration bounds not set.\nLikely causes: The [desk] table is missing base_height or max_height.\nHow to fix: Add both heights to the config.".to_string()
            }
            BuildError::MissingDeviceId => {
                "What happened: No device id was provided.\nLikely causes: desk.device_id is empty.\nHow to fix: Set desk.device_id to the desk's address.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the [control] table.\nHow to fix: Edit the config file, then rerun. See etc/desk.toml for a sample."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DeskError>() {
        return match de {
            DeskError::CalibrationInvalid { base, max } => format!(
                "What happened: Calibration is invalid (base_height {base}, max_height {max}).\nLikely causes: The heights are swapped or equal.\nHow to fix: Set desk.max_height greater than desk.base_height."
            ),
            DeskError::ConnectionFault(msg) => format!(
                "What happened: Could not talk to the desk ({msg}).\nLikely causes: Desk powered off or out of range, or a wrong device_id.\nHow to fix: Check desk.device_id and power, then rerun. The controller retries on its own while running."
            ),
            DeskError::Config(msg) => format!(
                "What happened: Configuration error ({msg}).\nLikely causes: Missing [desk] table, bad TOML syntax, or out-of-range values.\nHow to fix: Edit the config file, then rerun."
            ),
            DeskError::MalformedFrame(msg) => format!(
                "What happened: The desk sent an unexpected frame ({msg}).\nLikely causes: Wrong protocol.layout for this desk revision.\nHow to fix: Try the other value of protocol.layout."
            ),
            DeskError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: The desk stopped reporting or could not reach the target.\nHow to fix: Re-run with --log-level=debug or raise --timeout-ms."
            ),
        };
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes for scripting; anything untyped maps to 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 5;
    }
    match err.downcast_ref::<DeskError>() {
        Some(DeskError::CalibrationInvalid { .. }) => 3,
        Some(DeskError::ConnectionFault(_)) => 4,
        Some(DeskError::Config(_)) => 5,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    match err.downcast_ref::<DeskError>() {
        Some(DeskError::CalibrationInvalid { .. }) => "CalibrationInvalid",
        Some(DeskError::ConnectionFault(_)) => "ConnectionFault",
        Some(DeskError::Config(_)) => "Config",
        Some(DeskError::MalformedFrame(_)) => "MalformedFrame",
        Some(DeskError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_errors_get_stable_codes() {
        let cal = eyre::Report::new(DeskError::CalibrationInvalid {
            base: 900.0,
            max: 600.0,
        });
        assert_eq!(exit_code_for_error(&cal), 3);
        assert!(humanize(&cal).contains("base_height 900"));

        let fault = eyre::Report::new(DeskError::ConnectionFault("gone".into()));
        assert_eq!(exit_code_for_error(&fault), 4);

        let build = eyre::Report::new(BuildError::MissingDeviceId);
        assert_eq!(exit_code_for_error(&build), 5);

        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
    }

    #[test]
    fn json_errors_carry_reason() {
        let fault = eyre::Report::new(DeskError::ConnectionFault("gone".into()));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&fault)).unwrap();
        assert_eq!(v["reason"], "ConnectionFault");
        assert!(v["message"].as_str().unwrap().contains("gone"));
    }
}
