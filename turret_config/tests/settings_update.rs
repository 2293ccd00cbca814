use std::fs;

use rstest::rstest;
use tempfile::tempdir;
use turret_config::{Config, SettingsUpdate, load_settings};

#[test]
fn update_from_file_applies_and_rederives_revolution() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    fs::write(
        &path,
        "pos_0_degrees = 0\npos_270_degrees = 22166\nmax_speed = 3000.0\nauto_rotation_enabled = true\n",
    )
    .unwrap();

    let upd = load_settings(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(upd.touches_calibration());
    assert!(upd.touches_motion());
    assert!(upd.touches_rotation());

    let mut cfg = Config::default();
    cfg.apply(&upd).unwrap();
    assert_eq!(cfg.calibration.full_rotation_count, 29_554);
    assert!((cfg.motion.max_speed - 3000.0).abs() < f32::EPSILON);
    assert!(cfg.rotation.auto_rotation_enabled);
    // untouched keys keep their values
    assert_eq!(cfg.calibration.pos_90_degrees, 39_375);
    assert_eq!(cfg.rotation.rotation_interval, 60);
}

#[test]
fn explicit_revolution_wins_over_derivation() {
    let upd = load_settings("pos_270_degrees = 22166\nfull_rotation_count = 29555").unwrap();
    let mut cfg = Config::default();
    cfg.apply(&upd).unwrap();
    assert_eq!(cfg.calibration.full_rotation_count, 29_555);
}

#[rstest]
#[case("max_speed = 3500.0")]
#[case("auto_rotation_enabled = true")]
#[case("vel_loop_p = 4e-5\nrotation_interval = 30")]
fn update_without_references_keeps_revolution(#[case] settings: &str) {
    let mut cfg = turret_config::load_toml("[calibration]\nfull_rotation_count = 29555").unwrap();
    let upd = load_settings(settings).unwrap();
    assert!(!upd.touches_calibration());
    cfg.apply(&upd).unwrap();
    assert_eq!(cfg.calibration.full_rotation_count, 29_555);
}

#[test]
fn moving_one_reference_rederives_revolution() {
    let mut cfg = turret_config::load_toml("[calibration]\nfull_rotation_count = 29555").unwrap();
    let upd = load_settings("pos_90_degrees = 40000").unwrap();
    assert!(upd.touches_references());
    cfg.apply(&upd).unwrap();
    // stock pos_0/pos_270 derive the stock revolution
    assert_eq!(cfg.calibration.full_rotation_count, 157_500);
}

#[test]
fn rejected_update_leaves_config_untouched() {
    let upd = SettingsUpdate {
        max_speed: Some(250.0),
        acceleration: Some(0.0),
        ..SettingsUpdate::default()
    };
    let mut cfg = Config::default();
    let err = cfg.apply(&upd).unwrap_err();
    assert!(format!("{err}").contains("acceleration"));
    assert!((cfg.motion.max_speed - 4000.0).abs() < f32::EPSILON);
}

#[test]
fn collapsed_references_are_rejected() {
    // 0 and 270 on the same count derive a zero-length revolution
    let upd = load_settings("pos_0_degrees = 500\npos_270_degrees = 500").unwrap();
    let mut cfg = Config::default();
    assert!(cfg.apply(&upd).is_err());
    assert_eq!(cfg.calibration.pos_0_degrees, 0);
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(load_settings("wifi_ssid = \"home\"").is_err());
}

#[rstest]
#[case(0, [0, 39_375, 78_750, 118_125])]
#[case(1_000, [1_000, 40_375, 79_750, 119_125])]
#[case(-500, [-500, 38_875, 78_250, 117_625])]
fn set_zero_shifts_all_references(#[case] current: i64, #[case] expected: [i64; 4]) {
    let mut cfg = Config::default();
    cfg.set_zero(current);
    let c = cfg.calibration;
    assert_eq!(
        [c.pos_0_degrees, c.pos_90_degrees, c.pos_180_degrees, c.pos_270_degrees],
        expected
    );
    assert_eq!(c.full_rotation_count, 157_500);
}
