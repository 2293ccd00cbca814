//! Human-readable error descriptions, exit codes and structured JSON errors.

use turret_core::error::{BuildError, TurretError};

/// Stable process exit codes, one per error kind.
pub mod exit {
    pub const OTHER: i32 = 1;
    // 2 is clap's usage error
    pub const CONFIG: i32 = 3;
    pub const COMMAND: i32 = 4;
    pub const HARDWARE: i32 = 5;
    pub const STATE: i32 = 6;
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingEncoder => {
                "What happened: No encoder was provided to the motion engine.\nLikely causes: The encoder failed to initialize or was not wired into the builder.\nHow to fix: Ensure the encoder is created successfully and passed via with_encoder(...).".to_string()
            }
            BuildError::MissingMotor => {
                "What happened: No motor driver was provided to the motion engine.\nLikely causes: The PWM driver failed to initialize or was not wired into the builder.\nHow to fix: Ensure the motor is created successfully and passed via with_motor(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the [motion], [rotation] or [scheduler] sections.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<TurretError>() {
        return match te {
            TurretError::InvalidAngle(angle) => format!(
                "What happened: {angle} is not a quarter-turn angle.\nHow to fix: Use one of 0, 90, 180 or 270."
            ),
            TurretError::Calibration(msg) => format!(
                "What happened: The turret is not calibrated ({msg}).\nLikely causes: calibration.full_rotation_count is 0 or the reference positions coincide.\nHow to fix: Set the pos_*_degrees references (or full_rotation_count) in the config or a settings file."
            ),
            TurretError::HardwareFault(msg) => format!(
                "What happened: The motor driver reported a fault ({msg}).\nLikely causes: Overcurrent, a stalled turret, or a driver supply problem.\nHow to fix: Check the mechanics and the driver supply, then retry."
            ),
            TurretError::Hardware(msg) => format!(
                "What happened: Hardware access failed ({msg}).\nLikely causes: Wrong pin numbers, PWM not enabled in the device tree, or insufficient GPIO permissions.\nHow to fix: Check [pins] in the config and that the process may access GPIO/PWM."
            ),
            TurretError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nHow to fix: Edit the TOML and try again."
            ),
            TurretError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: The move takes longer than the timeout, or the turret cannot reach the target.\nHow to fix: Raise --timeout-s, check the motor direction (motion.invert_drive) and the wiring."
            ),
        };
    }

    // Generic fallback
    let msg = format!("{err:#}");
    format!(
        "Something went wrong: {msg}\nHow to fix: Re-run with --log-level=debug for details."
    )
}

/// Stable exit code for an error; unknown errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return exit::CONFIG;
    }
    match err.downcast_ref::<TurretError>() {
        Some(TurretError::Config(_)) => exit::CONFIG,
        Some(TurretError::InvalidAngle(_) | TurretError::Calibration(_)) => exit::COMMAND,
        Some(TurretError::Hardware(_) | TurretError::HardwareFault(_)) => exit::HARDWARE,
        Some(TurretError::State(_)) => exit::STATE,
        None => exit::OTHER,
    }
}

fn kind_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<TurretError>() {
        Some(TurretError::Calibration(_)) => "Calibration",
        Some(TurretError::InvalidAngle(_)) => "InvalidAngle",
        Some(TurretError::Hardware(_)) => "Hardware",
        Some(TurretError::HardwareFault(_)) => "HardwareFault",
        Some(TurretError::Config(_)) => "Config",
        Some(TurretError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "type": "error",
        "reason": kind_name(err),
        "exit_code": exit_code_for_error(err),
        "detail": format!("{err:#}"),
        "message": humanize(err),
    })
    .to_string()
}
