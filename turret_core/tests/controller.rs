use std::sync::Arc;
use std::time::{Duration, Instant};

use rstest::rstest;
use turret_core::mocks::{FixedEncoder, RecordingMotor};
use turret_core::{
    Calibration, Command, MotionController, MotionShared, MotionStatus, PidState,
    RotationSchedule, TuningParams, TurretError, UnwrapStrategy,
};
use turret_traits::Encoder;

const TICK: Duration = Duration::from_millis(10);

struct Rig {
    encoder: FixedEncoder,
    motor: RecordingMotor,
    ctl: MotionController<RecordingMotor>,
    t0: Instant,
}

fn rig_with(tuning: TuningParams, calibration: Calibration, unwrap: UnwrapStrategy) -> Rig {
    let encoder = FixedEncoder::new(0);
    let motor = RecordingMotor::new();
    let t0 = Instant::now();
    let shared = Arc::new(MotionShared::new(
        t0,
        &calibration,
        tuning.vel_filter_persistence,
        RotationSchedule::default(),
    ));
    let ctl = MotionController::new(
        Arc::new(encoder.clone()),
        motor.clone(),
        tuning,
        calibration,
        unwrap,
        shared,
        t0,
    );
    Rig {
        encoder,
        motor,
        ctl,
        t0,
    }
}

fn rig() -> Rig {
    rig_with(
        TuningParams::default(),
        Calibration::with_revolution(0, 1_000),
        UnwrapStrategy::Normalize,
    )
}

#[test]
fn idle_controller_does_nothing() {
    let mut r = rig();
    assert_eq!(r.ctl.tick(r.t0 + TICK, 0.0).unwrap(), MotionStatus::Idle);
    assert!(r.motor.commands().is_empty());
}

#[test]
fn moving_toward_positive_target_drives_forward() {
    let mut r = rig();
    r.ctl.start_move(10_000, r.t0);
    assert_eq!(r.ctl.tick(r.t0 + TICK, 0.0).unwrap(), MotionStatus::Moving);
    let drive = r.motor.last().unwrap();
    assert!(drive > 0.0, "drive = {drive}");
    assert!(r.ctl.setpoint() > 0.0);
}

#[test]
fn invert_drive_negates_command() {
    let tuning = TuningParams {
        invert_drive: true,
        ..TuningParams::default()
    };
    let mut r = rig_with(
        tuning,
        Calibration::with_revolution(0, 1_000),
        UnwrapStrategy::Normalize,
    );
    r.ctl.start_move(10_000, r.t0);
    r.ctl.tick(r.t0 + TICK, 0.0).unwrap();
    assert!(r.motor.last().unwrap() < 0.0);
}

#[rstest]
#[case(998)]
#[case(1_000)]
#[case(1_005)]
#[case(995)]
fn arrival_within_hysteresis_is_reported_once(#[case] position: i64) {
    let mut r = rig();
    r.ctl.start_move(1_000, r.t0);
    r.encoder.set(position);
    assert_eq!(
        r.ctl.tick(r.t0 + TICK, 0.0).unwrap(),
        MotionStatus::Arrived { position }
    );
    assert_eq!(r.motor.last(), Some(0.0));
    assert!(!r.ctl.state().active);
    assert_eq!(r.ctl.tick(r.t0 + TICK * 2, 0.0).unwrap(), MotionStatus::Idle);
}

#[test]
fn arrival_after_travel_clears_loop_state() {
    let mut r = rig();
    r.ctl.start_move(1_000, r.t0);
    for (k, pos) in (1u32..).zip([0, 100, 250, 500, 750]) {
        r.encoder.set(pos);
        assert_eq!(r.ctl.tick(r.t0 + TICK * k, 0.0).unwrap(), MotionStatus::Moving);
    }
    assert_ne!(r.ctl.pid_state(), PidState::default());
    assert!(r.ctl.setpoint() > 0.0);

    r.encoder.set(997);
    assert_eq!(
        r.ctl.tick(r.t0 + TICK * 6, 0.0).unwrap(),
        MotionStatus::Arrived { position: 997 }
    );
    assert_eq!(r.ctl.pid_state(), PidState::default());
    assert_eq!(r.ctl.setpoint(), 0.0);
    assert_eq!(r.motor.last(), Some(0.0));
}

#[test]
fn just_outside_hysteresis_keeps_moving() {
    let mut r = rig();
    r.ctl.start_move(1_000, r.t0);
    r.encoder.set(994);
    assert_eq!(r.ctl.tick(r.t0 + TICK, 0.0).unwrap(), MotionStatus::Moving);
}

#[test]
fn new_move_resets_pid_and_overrides_target() {
    let mut r = rig();
    r.ctl.start_move(10_000, r.t0);
    for k in 1..=5 {
        r.ctl.tick(r.t0 + TICK * k, 0.0).unwrap();
    }
    assert_ne!(r.ctl.pid_state(), PidState::default());
    let setpoint = r.ctl.setpoint();

    r.ctl.start_move(-500, r.t0 + TICK * 5);
    assert_eq!(r.ctl.pid_state(), PidState::default());
    assert_eq!(r.ctl.state().target_position, -500);
    // the profile re-plans from the setpoint already in flight
    assert_eq!(r.ctl.setpoint(), setpoint);
}

#[test]
fn zero_elapsed_time_skips_the_loop() {
    let mut r = rig();
    r.ctl.start_move(10_000, r.t0);
    let now = r.t0 + TICK;
    r.ctl.tick(now, 0.0).unwrap();
    let sent = r.motor.commands().len();
    let pid = r.ctl.pid_state();
    assert_eq!(r.ctl.tick(now, 0.0).unwrap(), MotionStatus::Moving);
    assert_eq!(r.motor.commands().len(), sent);
    assert_eq!(r.ctl.pid_state(), pid);
}

#[test]
fn driver_error_aborts_motion() {
    let mut r = rig();
    r.ctl.start_move(10_000, r.t0);
    r.motor.set_failing(true);
    let err = r.ctl.tick(r.t0 + TICK, 0.0).unwrap_err();
    assert!(err.to_string().contains("motion aborted"), "{err}");
    assert!(matches!(
        err.downcast_ref::<TurretError>(),
        Some(TurretError::HardwareFault(_))
    ));
    assert!(!r.ctl.state().active);

    r.motor.set_failing(false);
    assert_eq!(r.ctl.tick(r.t0 + TICK * 2, 0.0).unwrap(), MotionStatus::Idle);
}

#[test]
fn rotate_resolves_quarter_turn_from_zero_reference() {
    let mut r = rig_with(
        TuningParams::default(),
        Calibration::with_revolution(0, 29_555),
        UnwrapStrategy::Normalize,
    );
    assert_eq!(r.ctl.rotate_to_angle(90, r.t0).unwrap(), 7_388);
    assert!(r.ctl.state().active);
    assert_eq!(r.ctl.state().target_position, 7_388);
}

#[test]
fn rotate_takes_the_short_way_round() {
    let mut r = rig();
    r.encoder.set(2_100);
    // 270 degrees is 750; from 2100 (=100 within the turn) the nearest is 1750
    assert_eq!(r.ctl.rotate_to_angle(270, r.t0).unwrap(), 1_750);
}

#[test]
fn rotate_rejects_non_quarter_angle() {
    let mut r = rig();
    let err = r.ctl.rotate_to_angle(45, r.t0).unwrap_err();
    assert_eq!(
        err.downcast_ref::<TurretError>(),
        Some(&TurretError::InvalidAngle(45))
    );
    assert!(!r.ctl.state().active);
}

#[test]
fn set_zero_command_moves_zero_reference() {
    let mut r = rig();
    r.encoder.set(480);
    r.ctl.apply(Command::SetZero, r.t0);
    assert_eq!(r.ctl.calibration().pos_0, 480);
    assert_eq!(r.ctl.calibration().full_rotation_count, 1_000);
    assert_eq!(r.ctl.calibration().angle_of(730), 90);
}

#[test]
fn full_rotation_count_command_keeps_references() {
    let mut r = rig();
    r.ctl.apply(Command::SetFullRotationCount(2_000), r.t0);
    assert_eq!(r.ctl.calibration().full_rotation_count, 2_000);
    assert_eq!(r.ctl.calibration().pos_90, 250);
}

#[test]
fn tuning_command_changes_hysteresis() {
    let mut r = rig();
    let wide = TuningParams {
        position_hysteresis: 50,
        ..TuningParams::default()
    };
    r.ctl.apply(Command::SetTuning(wide), r.t0);
    r.ctl.start_move(1_000, r.t0);
    r.encoder.set(960);
    assert_eq!(
        r.ctl.tick(r.t0 + TICK, 0.0).unwrap(),
        MotionStatus::Arrived { position: 960 }
    );
}

#[test]
fn rebase_pulls_counter_back_one_revolution() {
    let mut r = rig_with(
        TuningParams::default(),
        Calibration::with_revolution(0, 1_000),
        UnwrapStrategy::Rebase,
    );
    r.encoder.set(2_500);
    r.ctl.start_move(2_500, r.t0);
    r.ctl.tick(r.t0 + TICK, 0.0).unwrap();
    assert_eq!(r.encoder.count(), 1_500);
    assert_eq!(r.ctl.state().target_position, 1_500);
}

#[test]
fn normalize_leaves_counter_alone() {
    let mut r = rig();
    r.encoder.set(2_500);
    r.ctl.start_move(2_500, r.t0);
    r.ctl.tick(r.t0 + TICK, 0.0).unwrap();
    assert_eq!(r.encoder.count(), 2_500);
}

#[test]
fn dropping_controller_stops_motor() {
    let r = rig();
    let motor = r.motor.clone();
    drop(r);
    assert_eq!(motor.last(), Some(0.0));
}
