//! `From` implementations bridging `turret_config` types to `turret_core` types.

use crate::calibration::Calibration;
use crate::config::{RotationSchedule, SchedulerCfg, TuningParams, UnwrapStrategy};
use crate::util::period_from_ms;

// ── Calibration ──────────────────────────────────────────────────────────────

impl From<&turret_config::CalibrationCfg> for Calibration {
    fn from(c: &turret_config::CalibrationCfg) -> Self {
        Self {
            pos_0: c.pos_0_degrees,
            pos_90: c.pos_90_degrees,
            pos_180: c.pos_180_degrees,
            pos_270: c.pos_270_degrees,
            full_rotation_count: c.full_rotation_count,
        }
    }
}

impl From<&Calibration> for turret_config::CalibrationCfg {
    fn from(c: &Calibration) -> Self {
        Self {
            pos_0_degrees: c.pos_0,
            pos_90_degrees: c.pos_90,
            pos_180_degrees: c.pos_180,
            pos_270_degrees: c.pos_270,
            full_rotation_count: c.full_rotation_count,
        }
    }
}

// ── TuningParams ─────────────────────────────────────────────────────────────

impl From<&turret_config::MotionCfg> for TuningParams {
    fn from(c: &turret_config::MotionCfg) -> Self {
        Self {
            position_hysteresis: c.position_hysteresis,
            max_speed: c.max_speed,
            acceleration: c.acceleration,
            p: c.vel_loop_p,
            i: c.vel_loop_i,
            d: c.vel_loop_d,
            vel_filter_persistence: c.vel_filter_persistence,
            spd_err_persistence: c.spd_err_persistence,
            invert_drive: c.invert_drive,
        }
    }
}

impl From<turret_config::UnwrapMode> for UnwrapStrategy {
    fn from(m: turret_config::UnwrapMode) -> Self {
        match m {
            turret_config::UnwrapMode::Normalize => Self::Normalize,
            turret_config::UnwrapMode::Rebase => Self::Rebase,
        }
    }
}

// ── RotationSchedule ─────────────────────────────────────────────────────────

impl From<&turret_config::RotationCfg> for RotationSchedule {
    fn from(c: &turret_config::RotationCfg) -> Self {
        Self {
            interval_s: c.rotation_interval,
            enabled: c.auto_rotation_enabled,
            forward: c.auto_rotate_forward,
        }
    }
}

// ── SchedulerCfg ─────────────────────────────────────────────────────────────

impl From<&turret_config::SchedulerCfg> for SchedulerCfg {
    fn from(c: &turret_config::SchedulerCfg) -> Self {
        Self {
            encoder: period_from_ms(c.encoder_ms),
            control: period_from_ms(c.control_ms),
            auto_rotation: period_from_ms(c.auto_rotation_ms),
            telemetry: period_from_ms(c.telemetry_ms),
            status: period_from_ms(c.status_ms),
        }
    }
}
