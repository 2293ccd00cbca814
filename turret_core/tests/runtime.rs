//! Background thread lifecycle with the real clock.

use std::time::{Duration, Instant};

use turret_core::mocks::{FixedEncoder, RecordingMotor};
use turret_core::{Calibration, Turret};

fn wait_until(limit: Duration, mut f: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + limit;
    while Instant::now() < end {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    f()
}

#[test]
fn spawned_runtime_processes_commands_and_shuts_down() {
    let encoder = FixedEncoder::new(0);
    let motor = RecordingMotor::new();
    let turret = Turret::builder()
        .with_encoder(encoder.clone())
        .with_motor(motor.clone())
        .with_calibration(Calibration::with_revolution(0, 1_000))
        .build()
        .unwrap();
    let rt = turret.spawn();
    assert!(rt.is_running());

    let h = rt.handle();
    h.rotate_to_angle(90).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        h.motion_info().target == 250 && !motor.commands().is_empty()
    }));

    // pretend the shaft got there
    encoder.set(250);
    assert!(wait_until(Duration::from_secs(2), || !h.is_active()));
    assert!(wait_until(Duration::from_secs(2), || !rt
        .telemetry()
        .is_empty()));

    let stats = rt.shutdown();
    let control = stats.iter().find(|s| s.name == "control").unwrap();
    assert!(control.runs > 0);
    assert_eq!(motor.last(), Some(0.0));
}

#[test]
fn dropping_runtime_stops_motor() {
    let motor = RecordingMotor::new();
    let turret = Turret::builder()
        .with_encoder(FixedEncoder::new(0))
        .with_motor(motor.clone())
        .build()
        .unwrap();
    let rt = turret.spawn();
    rt.handle().move_to(10_000).unwrap();
    assert!(wait_until(Duration::from_secs(2), || motor
        .commands()
        .iter()
        .any(|c| *c != 0.0)));
    drop(rt);
    assert_eq!(motor.last(), Some(0.0));
}

#[test]
fn handle_reports_stopped_runtime() {
    let turret = Turret::builder()
        .with_encoder(FixedEncoder::new(0))
        .with_motor(RecordingMotor::new())
        .build()
        .unwrap();
    let rt = turret.spawn();
    let h = rt.handle();
    rt.shutdown();
    assert!(h.move_to(5).is_err());
    assert!(!h.is_active());
}
