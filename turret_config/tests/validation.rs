use rstest::rstest;
use turret_config::{UnwrapMode, load_toml};

#[test]
fn accepts_full_document() {
    let toml = r#"
[calibration]
pos_0_degrees = 100
pos_90_degrees = 7488
pos_180_degrees = 14877
pos_270_degrees = 22266
full_rotation_count = 29555

[motion]
position_hysteresis = 5
max_speed = 4000.0
acceleration = 2000.0
vel_loop_p = 3e-5
vel_loop_i = 6e-3
vel_loop_d = -2e-8
vel_filter_persistence = 0.2
spd_err_persistence = 0.2
invert_drive = true
unwrap = "rebase"

[rotation]
rotation_interval = 30
auto_rotation_enabled = true
auto_rotate_forward = false

[scheduler]
encoder_ms = 10
control_ms = 10
auto_rotation_ms = 1000
telemetry_ms = 100
status_ms = 250

[logging]
level = "debug"
rotation = "daily"

[simulation]
free_speed = 6000.0
time_constant_s = 0.05

[pins]
encoder_a = 5
encoder_b = 6
status_led = 13
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.calibration.full_rotation_count, 29_555);
    assert_eq!(cfg.motion.unwrap, UnwrapMode::Rebase);
    assert!(cfg.motion.invert_drive);
    assert!(!cfg.rotation.auto_rotate_forward);
    assert_eq!(cfg.pins.status_led, Some(13));
}

#[rstest]
#[case("[calibration]\nfull_rotation_count = 0", "full_rotation_count must be > 0")]
#[case("[calibration]\nfull_rotation_count = -4", "full_rotation_count must be > 0")]
#[case("[motion]\nmax_speed = 0.0", "max_speed must be > 0")]
#[case("[motion]\nacceleration = -1.0", "acceleration must be > 0")]
#[case("[motion]\nvel_loop_i = nan", "vel_loop_i must be finite")]
#[case("[motion]\nvel_filter_persistence = 1.0", "vel_filter_persistence must be in")]
#[case("[motion]\nspd_err_persistence = -0.1", "spd_err_persistence must be in")]
#[case("[rotation]\nrotation_interval = 0", "rotation_interval must be >= 1")]
#[case("[scheduler]\ncontrol_ms = 0", "control_ms must be >= 1")]
#[case("[scheduler]\nstatus_ms = 120000", "status_ms is unreasonably large")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
#[case("[simulation]\nfree_speed = 0.0", "free_speed must be > 0")]
#[case("[pins]\nencoder_a = 4\nencoder_b = 4", "must differ")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    let msg = format!("{err}");
    assert!(msg.contains(needle), "{msg:?} does not mention {needle:?}");
}

#[test]
fn hysteresis_must_fit_in_half_a_revolution() {
    let toml = r#"
[calibration]
full_rotation_count = 100

[motion]
position_hysteresis = 50
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    assert!(cfg.validate().is_err());
}

#[test]
fn unknown_unwrap_mode_fails_to_parse() {
    let err = load_toml("[motion]\nunwrap = \"wrap\"").unwrap_err();
    assert!(format!("{err}").contains("unwrap"));
}
