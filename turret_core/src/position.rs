//! Circular arithmetic over an unbounded encoder count.
//!
//! Every operation needs a strictly positive `full_rotation_count`. The plain
//! variants fail closed: they log and return 0 when uncalibrated. The
//! `checked_*` variants return `TurretError::Calibration` instead, for callers
//! that must reject a command rather than act on a sentinel.

use crate::error::TurretError;

/// Degrees in one revolution.
pub const FULL_TURN_DEG: u16 = 360;
/// Degrees between reference positions.
pub const QUARTER_TURN_DEG: u16 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionModel {
    full_rotation_count: i64,
}

impl PositionModel {
    pub const fn new(full_rotation_count: i64) -> Self {
        Self {
            full_rotation_count,
        }
    }

    pub const fn full_rotation_count(&self) -> i64 {
        self.full_rotation_count
    }

    pub const fn is_calibrated(&self) -> bool {
        self.full_rotation_count > 0
    }

    fn frc(&self) -> Result<i64, TurretError> {
        if self.full_rotation_count > 0 {
            Ok(self.full_rotation_count)
        } else {
            Err(TurretError::Calibration(format!(
                "full_rotation_count is {}",
                self.full_rotation_count
            )))
        }
    }

    /// Position within one revolution, in `[0, full_rotation_count)`.
    pub fn checked_normalize(&self, position: i64) -> Result<i64, TurretError> {
        Ok(position.rem_euclid(self.frc()?))
    }

    /// Count offset of `angle` degrees from the zero reference, truncated.
    pub fn checked_angle_to_offset(&self, angle: u16) -> Result<i64, TurretError> {
        let frc = i128::from(self.frc()?);
        let off = i128::from(angle) * frc / i128::from(FULL_TURN_DEG);
        Ok(i64::try_from(off).unwrap_or(i64::MAX))
    }

    /// Angle of `position` in `[0, 360)`, truncated.
    pub fn checked_to_angle(&self, position: i64) -> Result<u16, TurretError> {
        let frc = self.frc()?;
        let n = i128::from(position.rem_euclid(frc));
        let deg = n * i128::from(FULL_TURN_DEG) / i128::from(frc);
        Ok(u16::try_from(deg).unwrap_or(0))
    }

    /// Shortest signed count delta taking `from` onto `to` modulo a revolution.
    ///
    /// `normalize(from + d) == normalize(to)` and `|d| <= frc / 2`; an exact
    /// half turn resolves to the direct difference of the normalized values.
    pub fn checked_signed_circular_distance(&self, from: i64, to: i64) -> Result<i64, TurretError> {
        let frc = self.frc()?;
        let direct = to.rem_euclid(frc) - from.rem_euclid(frc);
        let alternate = if direct > 0 {
            direct - frc
        } else {
            direct + frc
        };
        Ok(if direct.abs() <= alternate.abs() {
            direct
        } else {
            alternate
        })
    }

    pub fn normalize(&self, position: i64) -> i64 {
        fail_closed("normalize", self.checked_normalize(position))
    }

    pub fn angle_to_offset(&self, angle: u16) -> i64 {
        fail_closed("angle_to_offset", self.checked_angle_to_offset(angle))
    }

    pub fn to_angle(&self, position: i64) -> u16 {
        fail_closed("to_angle", self.checked_to_angle(position))
    }

    pub fn signed_circular_distance(&self, from: i64, to: i64) -> i64 {
        fail_closed(
            "signed_circular_distance",
            self.checked_signed_circular_distance(from, to),
        )
    }
}

fn fail_closed<T: Default>(op: &'static str, r: Result<T, TurretError>) -> T {
    r.unwrap_or_else(|e| {
        tracing::error!(op, error = %e, "circular math on uncalibrated turret");
        T::default()
    })
}

/// Nearest multiple of 90 degrees, halves rounding up; 360 wraps to 0.
pub fn snap_to_quarter(angle: u16) -> u16 {
    let a = angle % FULL_TURN_DEG;
    (a + QUARTER_TURN_DEG / 2) / QUARTER_TURN_DEG * QUARTER_TURN_DEG % FULL_TURN_DEG
}

/// The quarter after `snapped` in the given direction.
pub fn next_quarter(snapped: u16, forward: bool) -> u16 {
    let step = if forward {
        QUARTER_TURN_DEG
    } else {
        FULL_TURN_DEG - QUARTER_TURN_DEG
    };
    (snapped % FULL_TURN_DEG + step) % FULL_TURN_DEG
}

pub const fn is_quarter(angle: u16) -> bool {
    angle < FULL_TURN_DEG && angle % QUARTER_TURN_DEG == 0
}
