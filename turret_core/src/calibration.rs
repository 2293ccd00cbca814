//! Reference positions of the four quarter turns.

use crate::error::TurretError;
use crate::position::{PositionModel, is_quarter};
use turret_config::CalibrationCfg;

/// Encoder counts of the 0/90/180/270 degree references plus counts per
/// revolution. Angles are measured from `pos_0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub pos_0: i64,
    pub pos_90: i64,
    pub pos_180: i64,
    pub pos_270: i64,
    pub full_rotation_count: i64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self::from_reference(0, 39_375, 78_750, 118_125)
    }
}

impl Calibration {
    /// Build from the four references, deriving the revolution length.
    pub fn from_reference(pos_0: i64, pos_90: i64, pos_180: i64, pos_270: i64) -> Self {
        let mut cfg = CalibrationCfg {
            pos_0_degrees: pos_0,
            pos_90_degrees: pos_90,
            pos_180_degrees: pos_180,
            pos_270_degrees: pos_270,
            full_rotation_count: 0,
        };
        cfg.full_rotation_count = cfg.derived_full_rotation_count();
        Self::from(&cfg)
    }

    /// Uniform references for a known revolution length, zero at `pos_0`.
    pub fn with_revolution(pos_0: i64, full_rotation_count: i64) -> Self {
        let m = PositionModel::new(full_rotation_count);
        Self {
            pos_0,
            pos_90: pos_0.saturating_add(m.angle_to_offset(90)),
            pos_180: pos_0.saturating_add(m.angle_to_offset(180)),
            pos_270: pos_0.saturating_add(m.angle_to_offset(270)),
            full_rotation_count,
        }
    }

    pub const fn model(&self) -> PositionModel {
        PositionModel::new(self.full_rotation_count)
    }

    pub const fn is_calibrated(&self) -> bool {
        self.full_rotation_count > 0
    }

    /// Angle of a raw count relative to the zero reference (0 if uncalibrated).
    pub fn angle_of(&self, count: i64) -> u16 {
        self.model().to_angle(count.saturating_sub(self.pos_0))
    }

    /// Absolute target count for a quarter-turn command issued at `current`,
    /// reached along the shorter way round.
    pub fn resolve_rotation(&self, current: i64, angle: u16) -> Result<i64, TurretError> {
        if !is_quarter(angle) {
            return Err(TurretError::InvalidAngle(angle));
        }
        let m = self.model();
        let goal = self.pos_0.saturating_add(m.checked_angle_to_offset(angle)?);
        let d = m.checked_signed_circular_distance(current, goal)?;
        Ok(current.saturating_add(d))
    }

    /// Same references shifted so that `current` becomes 0 degrees.
    #[must_use]
    pub fn with_zero_at(&self, current: i64) -> Self {
        let mut cfg = CalibrationCfg::from(self);
        cfg.set_zero(current);
        Self::from(&cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_references_give_stock_revolution() {
        assert_eq!(Calibration::default().full_rotation_count, 157_500);
    }

    #[test]
    fn rotation_resolves_relative_to_zero_reference() {
        let cal = Calibration::with_revolution(1_000, 1_000);
        // 90 degrees = 250 counts past pos_0
        assert_eq!(cal.resolve_rotation(1_000, 90), Ok(1_250));
        // from two turns further on, stay on that turn
        assert_eq!(cal.resolve_rotation(3_100, 90), Ok(3_250));
        // 270 from 0 is a quarter turn backwards
        assert_eq!(cal.resolve_rotation(1_000, 270), Ok(750));
    }

    #[test]
    fn rotation_rejects_bad_angle_and_uncalibrated() {
        let cal = Calibration::default();
        assert_eq!(cal.resolve_rotation(0, 45), Err(TurretError::InvalidAngle(45)));
        assert_eq!(cal.resolve_rotation(0, 360), Err(TurretError::InvalidAngle(360)));
        let flat = Calibration::from_reference(10, 10, 10, 10);
        assert!(matches!(
            flat.resolve_rotation(0, 90),
            Err(TurretError::Calibration(_))
        ));
    }

    #[test]
    fn derivation_and_zero_shift_agree_with_config() {
        let cal = Calibration::from_reference(0, 7_388, 14_777, 22_166);
        assert_eq!(cal.full_rotation_count, 29_554);

        let mut cfg = CalibrationCfg::from(&cal);
        cfg.set_zero(1_000);
        assert_eq!(cal.with_zero_at(1_000), Calibration::from(&cfg));
        assert_eq!(cal.with_zero_at(1_000).full_rotation_count, 29_554);
    }

    #[test]
    fn zero_shift_moves_every_reference() {
        let cal = Calibration::default().with_zero_at(-100);
        assert_eq!(
            (cal.pos_0, cal.pos_90, cal.pos_180, cal.pos_270),
            (-100, 39_275, 78_650, 118_025)
        );
        assert_eq!(cal.angle_of(-100), 0);
    }
}
