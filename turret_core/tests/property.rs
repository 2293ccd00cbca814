use proptest::prelude::*;
use turret_core::pid::{PidGains, VelocityPid};
use turret_core::position::{PositionModel, next_quarter, snap_to_quarter};
use turret_core::profile::next_velocity;

proptest! {
    #[test]
    fn normalize_stays_within_one_revolution(
        frc in 1i64..10_000_000,
        pos in -1_000_000_000_000i64..1_000_000_000_000,
    ) {
        let m = PositionModel::new(frc);
        let n = m.normalize(pos);
        prop_assert!((0..frc).contains(&n));
        prop_assert_eq!(m.normalize(pos + frc), n);
    }

    #[test]
    fn circular_distance_lands_on_target_the_short_way(
        frc in 1i64..10_000_000,
        from in -1_000_000_000i64..1_000_000_000,
        to in -1_000_000_000i64..1_000_000_000,
    ) {
        let m = PositionModel::new(frc);
        let d = m.signed_circular_distance(from, to);
        prop_assert_eq!(m.normalize(from + d), m.normalize(to));
        prop_assert!(d.unsigned_abs() <= frc.unsigned_abs() / 2);
    }

    #[test]
    fn angle_is_below_full_turn(frc in 1i64..10_000_000, pos in any::<i64>()) {
        prop_assert!(PositionModel::new(frc).to_angle(pos) < 360);
    }

    #[test]
    fn quarter_helpers_stay_on_quarters(angle in 0u16..720, forward in any::<bool>()) {
        let s = snap_to_quarter(angle);
        prop_assert_eq!(s % 90, 0);
        prop_assert!(s < 360);
        let n = next_quarter(s, forward);
        prop_assert_eq!(n % 90, 0);
        prop_assert_eq!(next_quarter(n, !forward), s);
    }

    #[test]
    fn profile_never_exceeds_max_speed(
        pos in -1_000_000i64..1_000_000,
        target in -1_000_000i64..1_000_000,
        v in -10_000.0f32..10_000.0,
        max_speed in 1.0f32..10_000.0,
        accel in 1.0f32..10_000.0,
        dt in 0.0f32..0.1,
    ) {
        let out = next_velocity(pos, target, v, max_speed, accel, dt);
        prop_assert!(out.abs() <= max_speed + 1e-3);
    }

    #[test]
    fn profile_decelerates_at_target(
        pos in -1_000_000i64..1_000_000,
        v in -4_000.0f32..4_000.0,
        dt in 0.001f32..0.1,
    ) {
        let out = next_velocity(pos, pos, v, 4_000.0, 2_000.0, dt);
        prop_assert!(out.abs() <= v.abs());
        prop_assert!(out == 0.0 || out.signum() == v.signum());
    }

    #[test]
    fn pid_drive_is_bounded(
        p in -1.0f32..1.0,
        i in -1.0f32..1.0,
        d in -1.0f32..1.0,
        samples in prop::collection::vec((-1e6f32..1e6, -1e6f32..1e6), 1..50),
    ) {
        let mut pid = VelocityPid::new(PidGains { p, i, d, derivative_persistence: 0.2 });
        for (target, measured) in samples {
            let out = pid.update(target, measured, 0.01);
            prop_assert!((-1.0..=1.0).contains(&out.drive));
        }
    }
}
