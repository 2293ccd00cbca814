//! End-to-end runs against the simulated plant in virtual time.

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use turret_core::{
    BuildError, Calibration, RotationSchedule, TuningParams, Turret, TurretError, UnwrapStrategy,
    snap_to_quarter,
};
use turret_hardware::{LogIndicator, PlantParams, SimulatedPlant};
use turret_traits::ManualClock;

const FRC: i64 = 29_555;

fn sim(initial_count: i64) -> (ManualClock, SimulatedPlant) {
    let clock = ManualClock::new();
    let plant = SimulatedPlant::new(
        PlantParams {
            initial_count,
            ..PlantParams::default()
        },
        Arc::new(clock.clone()),
    );
    (clock, plant)
}

fn turret(clock: &ManualClock, plant: &SimulatedPlant, schedule: RotationSchedule) -> Turret {
    Turret::builder()
        .with_encoder(plant.encoder())
        .with_motor(plant.motor())
        .with_calibration(Calibration::with_revolution(0, FRC))
        .with_rotation(schedule)
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap()
}

#[test]
fn rotate_90_arrives_within_hysteresis() {
    let (clock, plant) = sim(0);
    let mut t = turret(&clock, &plant, RotationSchedule::default());
    let h = t.handle();

    h.rotate_to_angle(90).unwrap();
    assert!(h.is_active(), "queued rotate must already count as active");
    assert!(t.run_until_idle(Duration::from_secs(30)));

    let pos = h.current_position();
    assert!((pos - 7_388).abs() <= 5, "pos = {pos}");
    assert_eq!(snap_to_quarter(h.current_angle()), 90);
    assert_eq!(h.last_angle(), Some(90));
    assert!(!h.motion_info().active);
    assert_eq!(h.motion_info().drive, 0.0);
    assert_eq!(plant.drive(), 0.0);
}

#[test]
fn published_loop_terms_clear_on_arrival() {
    let (clock, plant) = sim(0);
    let mut t = turret(&clock, &plant, RotationSchedule::default());
    let h = t.handle();
    h.rotate_to_angle(90).unwrap();
    t.run_for(Duration::from_secs(1));
    let mid = h.motion_info();
    assert!(mid.active);
    assert!(mid.error != 0.0 || mid.integral != 0.0, "{mid:?}");

    assert!(t.run_until_idle(Duration::from_secs(30)));
    let done = h.motion_info();
    assert_eq!(
        (done.error, done.integral, done.derivative, done.drive),
        (0.0, 0.0, 0.0, 0.0)
    );
}

#[test]
fn rebase_keeps_velocity_estimate_continuous() {
    let (clock, plant) = sim(2_400);
    let mut t = Turret::builder()
        .with_encoder(plant.encoder())
        .with_motor(plant.motor())
        .with_calibration(Calibration::with_revolution(0, 1_000))
        .with_unwrap(UnwrapStrategy::Rebase)
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    let h = t.handle();

    h.move_to(2_500).unwrap();
    assert!(t.run_until_idle(Duration::from_secs(30)));
    t.run_pending();

    // the counter is pulled back one revolution along with the target
    let pos = h.current_position();
    assert!((pos - 1_500).abs() <= 5, "pos = {pos}");
    assert_eq!(h.motion_info().target, 1_500);

    // a -1000 count jump without compensation would read as a huge speed
    let mut peak = 0.0f32;
    for _ in 0..20 {
        t.run_for(Duration::from_millis(10));
        peak = peak.max(h.velocity().abs());
    }
    assert!(peak < 200.0, "peak velocity {peak}");
    assert!(!h.is_active());
}

#[rstest]
#[case(0, 270, -7_389)]
#[case(0, 180, 14_777)]
#[case(FRC * 3, 90, FRC * 3 + 7_388)]
fn rotation_takes_shorter_way(#[case] start: i64, #[case] angle: u16, #[case] expect: i64) {
    let (clock, plant) = sim(start);
    let mut t = turret(&clock, &plant, RotationSchedule::default());
    let h = t.handle();
    h.rotate_to_angle(angle).unwrap();
    t.run_pending();
    assert_eq!(h.motion_info().target, expect);
}

#[test]
fn move_to_absolute_count_arrives() {
    let (clock, plant) = sim(0);
    let mut t = turret(&clock, &plant, RotationSchedule::default());
    let h = t.handle();
    h.move_to(-2_000).unwrap();
    assert!(t.run_until_idle(Duration::from_secs(30)));
    assert!((h.current_position() + 2_000).abs() <= 5);
}

#[test]
fn override_in_flight_goes_to_latest_target() {
    let (clock, plant) = sim(0);
    let mut t = turret(&clock, &plant, RotationSchedule::default());
    let h = t.handle();
    h.rotate_to_angle(90).unwrap();
    t.run_for(Duration::from_secs(1));
    assert!(h.is_active());
    h.rotate_to_angle(0).unwrap();
    assert!(t.run_until_idle(Duration::from_secs(30)));
    assert!(h.current_position().abs() <= 5, "pos = {}", h.current_position());
    assert_eq!(h.last_angle(), Some(0));
}

#[rstest]
#[case(true, 90, 7_388)]
#[case(false, 270, -7_389)]
fn auto_rotation_steps_one_quarter(
    #[case] forward: bool,
    #[case] angle: u16,
    #[case] target: i64,
) {
    let (clock, plant) = sim(0);
    let schedule = RotationSchedule {
        interval_s: 1,
        enabled: true,
        forward,
    };
    let mut t = turret(&clock, &plant, schedule);
    let h = t.handle();

    t.run_for(Duration::from_millis(900));
    assert!(!h.is_active());

    t.run_for(Duration::from_millis(600));
    assert_eq!(h.last_angle(), Some(angle));
    assert_eq!(h.motion_info().target, target);
    // no second trigger while the first move is still running
    t.run_for(Duration::from_secs(2));
    assert_eq!(h.motion_info().target, target);
}

#[test]
fn auto_rotation_disabled_never_moves() {
    let (clock, plant) = sim(0);
    let mut t = turret(&clock, &plant, RotationSchedule::default());
    let h = t.handle();
    t.run_for(Duration::from_secs(120));
    assert!(!h.is_active());
    assert_eq!(h.current_position(), 0);
}

#[test]
fn schedule_can_be_enabled_at_runtime() {
    let (clock, plant) = sim(0);
    let mut t = turret(&clock, &plant, RotationSchedule::default());
    let h = t.handle();
    t.run_for(Duration::from_secs(2));
    h.set_rotation_schedule(RotationSchedule {
        interval_s: 1,
        enabled: true,
        forward: true,
    });
    t.run_for(Duration::from_millis(1_100));
    assert_eq!(h.last_angle(), Some(90));
}

#[test]
fn set_zero_rebases_angles() {
    let (clock, plant) = sim(1_000);
    let mut t = turret(&clock, &plant, RotationSchedule::default());
    let h = t.handle();
    assert_ne!(h.current_angle(), 0);
    h.set_zero().unwrap();
    t.run_pending();
    assert_eq!(h.current_angle(), 0);

    h.rotate_to_angle(90).unwrap();
    clock.advance(Duration::from_millis(10));
    t.run_pending();
    assert_eq!(h.motion_info().target, 1_000 + 7_388);
}

#[test]
fn rejects_bad_angle_and_uncalibrated_rotation() {
    let (clock, plant) = sim(0);
    let t = turret(&clock, &plant, RotationSchedule::default());
    let err = t.handle().rotate_to_angle(45).unwrap_err();
    assert_eq!(
        err.downcast_ref::<TurretError>(),
        Some(&TurretError::InvalidAngle(45))
    );

    let t = Turret::builder()
        .with_encoder(plant.encoder())
        .with_motor(plant.motor())
        .with_calibration(Calibration::from_reference(0, 0, 0, 0))
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    let err = t.handle().rotate_to_angle(90).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TurretError>(),
        Some(TurretError::Calibration(_))
    ));
    assert!(!t.handle().is_active());
}

#[test]
fn invalid_tuning_is_rejected_by_handle() {
    let (clock, plant) = sim(0);
    let t = turret(&clock, &plant, RotationSchedule::default());
    let err = t
        .handle()
        .set_tuning(TuningParams {
            max_speed: 0.0,
            ..TuningParams::default()
        })
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TurretError>(),
        Some(TurretError::Config(_))
    ));
}

#[test]
fn invalid_tuning_is_rejected_by_builder() {
    let (clock, plant) = sim(0);
    let err = Turret::builder()
        .with_encoder(plant.encoder())
        .with_motor(plant.motor())
        .with_tuning(TuningParams {
            acceleration: -1.0,
            ..TuningParams::default()
        })
        .with_clock(Arc::new(clock))
        .build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn motor_fault_aborts_move_and_counts_failure() {
    let (clock, plant) = sim(0);
    let motor = plant.motor();
    let fault = motor.fault_switch();
    let mut t = Turret::builder()
        .with_encoder(plant.encoder())
        .with_motor(motor)
        .with_calibration(Calibration::with_revolution(0, FRC))
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    let h = t.handle();
    h.rotate_to_angle(90).unwrap();
    t.run_for(Duration::from_millis(200));
    fault.store(true, std::sync::atomic::Ordering::Relaxed);
    t.run_for(Duration::from_millis(50));

    assert!(!h.is_active());
    let control = t.stats().into_iter().find(|s| s.name == "control").unwrap();
    assert_eq!(control.failures, 1);
}

#[test]
fn telemetry_and_indicator_follow_motion() {
    let (clock, plant) = sim(0);
    let indicator = LogIndicator::new();
    let mut t = Turret::builder()
        .with_encoder(plant.encoder())
        .with_motor(plant.motor())
        .with_calibration(Calibration::with_revolution(0, FRC))
        .with_indicator(indicator.clone())
        .with_telemetry_capacity(1_000)
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    let h = t.handle();
    let rx = t.telemetry();
    h.rotate_to_angle(180).unwrap();
    t.run_for(Duration::from_secs(1));

    let samples: Vec<_> = rx.try_iter().collect();
    assert_eq!(samples.len(), 10);
    assert!(samples.iter().all(|s| s.target == 14_777));
    assert!(samples.last().unwrap().position > 0);
    assert_eq!(indicator.last_angle(), Some(180));
}

#[test]
fn ms_since_last_rotation_tracks_virtual_time() {
    let (clock, plant) = sim(0);
    let mut t = turret(&clock, &plant, RotationSchedule::default());
    let h = t.handle();
    h.rotate_to_angle(90).unwrap();
    t.run_pending();
    assert_eq!(h.ms_since_last_rotation(), 0);
    t.run_for(Duration::from_millis(500));
    let since = h.ms_since_last_rotation();
    assert!((500..=510).contains(&since), "{since}");
}
