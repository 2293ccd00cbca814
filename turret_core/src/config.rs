//! Runtime parameter structs used by the motion engine.

use std::time::Duration;

use crate::pid::PidGains;

/// Tuning of the velocity loop and the move profile. Replaced as a whole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningParams {
    /// Arrival band in counts.
    pub position_hysteresis: u32,
    /// counts/s
    pub max_speed: f32,
    /// counts/s^2
    pub acceleration: f32,
    pub p: f32,
    pub i: f32,
    pub d: f32,
    pub vel_filter_persistence: f32,
    pub spd_err_persistence: f32,
    /// Negate the loop output before it reaches the driver.
    pub invert_drive: bool,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            position_hysteresis: 5,
            max_speed: 4000.0,
            acceleration: 2000.0,
            p: 3e-5,
            i: 6e-3,
            d: -2e-8,
            vel_filter_persistence: 0.2,
            spd_err_persistence: 0.2,
            invert_drive: false,
        }
    }
}

impl TuningParams {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err("max_speed must be > 0");
        }
        if !(self.acceleration.is_finite() && self.acceleration > 0.0) {
            return Err("acceleration must be > 0");
        }
        if !(self.p.is_finite() && self.i.is_finite() && self.d.is_finite()) {
            return Err("PID gains must be finite");
        }
        if !(0.0..1.0).contains(&self.vel_filter_persistence) {
            return Err("vel_filter_persistence must be in [0, 1)");
        }
        if !(0.0..1.0).contains(&self.spd_err_persistence) {
            return Err("spd_err_persistence must be in [0, 1)");
        }
        Ok(())
    }

    pub fn pid_gains(&self) -> PidGains {
        PidGains {
            p: self.p,
            i: self.i,
            d: self.d,
            derivative_persistence: self.spd_err_persistence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationSchedule {
    pub interval_s: u64,
    pub enabled: bool,
    pub forward: bool,
}

impl Default for RotationSchedule {
    fn default() -> Self {
        Self {
            interval_s: 60,
            enabled: false,
            forward: true,
        }
    }
}

/// Periods of the fixed-rate tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerCfg {
    pub encoder: Duration,
    pub control: Duration,
    pub auto_rotation: Duration,
    pub telemetry: Duration,
    pub status: Duration,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            encoder: Duration::from_millis(10),
            control: Duration::from_millis(10),
            auto_rotation: Duration::from_millis(1000),
            telemetry: Duration::from_millis(100),
            status: Duration::from_millis(250),
        }
    }
}

/// What happens to the raw counter as the turret keeps turning one way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnwrapStrategy {
    /// Never touch the counter; all math is modular.
    #[default]
    Normalize,
    /// On arrival more than one revolution from `pos_0`, shift the counter
    /// one revolution back toward it.
    Rebase,
}
