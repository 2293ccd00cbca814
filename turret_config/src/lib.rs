#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the turret.
//!
//! - `Config` and its sections are deserialized from TOML; every section is
//!   optional and falls back to the factory defaults.
//! - `SettingsUpdate` is a partial settings file layered on top of a loaded
//!   config; moving a reference re-derives the full-rotation count.
use serde::Deserialize;

/// Counts per revolution of the stock gearbox.
pub const DEFAULT_FULL_ROTATION_COUNT: i64 = 157_500;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct CalibrationCfg {
    pub pos_0_degrees: i64,
    pub pos_90_degrees: i64,
    pub pos_180_degrees: i64,
    pub pos_270_degrees: i64,
    /// Counts per revolution. Normally derived from the 0 and 270 references.
    pub full_rotation_count: i64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            pos_0_degrees: 0,
            pos_90_degrees: 39_375,
            pos_180_degrees: 78_750,
            pos_270_degrees: 118_125,
            full_rotation_count: DEFAULT_FULL_ROTATION_COUNT,
        }
    }
}

impl CalibrationCfg {
    /// `|pos_270 - pos_0| * 4 / 3`, multiplied before dividing.
    pub fn derived_full_rotation_count(&self) -> i64 {
        let span = self.pos_270_degrees.abs_diff(self.pos_0_degrees);
        i64::try_from(span.saturating_mul(4) / 3).unwrap_or(i64::MAX)
    }

    /// Make `current` the 0 degree reference, shifting all four references
    /// by the same offset.
    pub fn set_zero(&mut self, current: i64) {
        let offset = current.saturating_sub(self.pos_0_degrees);
        self.pos_0_degrees = current;
        self.pos_90_degrees = self.pos_90_degrees.saturating_add(offset);
        self.pos_180_degrees = self.pos_180_degrees.saturating_add(offset);
        self.pos_270_degrees = self.pos_270_degrees.saturating_add(offset);
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnwrapMode {
    /// Leave the raw counter alone; all math is modular.
    #[default]
    Normalize,
    /// On arrival, pull the counter back by a revolution when it has
    /// wandered more than one turn away from the zero reference.
    Rebase,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct MotionCfg {
    /// Arrival band in counts.
    pub position_hysteresis: u32,
    /// counts/s
    pub max_speed: f32,
    /// counts/s^2
    pub acceleration: f32,
    pub vel_loop_p: f32,
    pub vel_loop_i: f32,
    pub vel_loop_d: f32,
    /// Weight of the previous estimate in the velocity filter, [0, 1).
    pub vel_filter_persistence: f32,
    /// Weight of the previous derivative in the PID derivative filter, [0, 1).
    pub spd_err_persistence: f32,
    /// Negate the PID output before it reaches the driver.
    pub invert_drive: bool,
    pub unwrap: UnwrapMode,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            position_hysteresis: 5,
            max_speed: 4000.0,
            acceleration: 2000.0,
            vel_loop_p: 3e-5,
            vel_loop_i: 6e-3,
            vel_loop_d: -2e-8,
            vel_filter_persistence: 0.2,
            spd_err_persistence: 0.2,
            invert_drive: false,
            unwrap: UnwrapMode::Normalize,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RotationCfg {
    /// Seconds between automatic quarter turns.
    pub rotation_interval: u64,
    pub auto_rotation_enabled: bool,
    /// true: 0 -> 90 -> 180 -> 270; false: the reverse.
    pub auto_rotate_forward: bool,
}

impl Default for RotationCfg {
    fn default() -> Self {
        Self {
            rotation_interval: 60,
            auto_rotation_enabled: false,
            auto_rotate_forward: true,
        }
    }
}

/// Periods of the fixed-rate tasks, in milliseconds.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SchedulerCfg {
    pub encoder_ms: u64,
    pub control_ms: u64,
    pub auto_rotation_ms: u64,
    pub telemetry_ms: u64,
    pub status_ms: u64,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            encoder_ms: 10,
            control_ms: 10,
            auto_rotation_ms: 1000,
            telemetry_ms: 100,
            status_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Parameters of the simulated motor used when no hardware is attached.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SimulationCfg {
    /// counts/s at full drive
    pub free_speed: f64,
    /// 0 disables the mechanical lag
    pub time_constant_s: f64,
    pub initial_count: i64,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            free_speed: 8000.0,
            time_constant_s: 0.0,
            initial_count: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Pins {
    pub encoder_a: u8,
    pub encoder_b: u8,
    pub status_led: Option<u8>,
    pub pwm_frequency_hz: f64,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            encoder_a: 17,
            encoder_b: 27,
            status_led: None,
            pwm_frequency_hz: 20_000.0,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub calibration: CalibrationCfg,
    pub motion: MotionCfg,
    pub rotation: RotationCfg,
    pub scheduler: SchedulerCfg,
    pub logging: Logging,
    pub simulation: SimulationCfg,
    pub pins: Pins,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Partial settings; absent keys leave the current value untouched.
///
/// Keys are flat, matching the names used on the wire by the control
/// surface:
///
/// ```toml
/// pos_90_degrees = 40000
/// max_speed = 3500.0
/// auto_rotation_enabled = true
/// ```
#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsUpdate {
    pub pos_0_degrees: Option<i64>,
    pub pos_90_degrees: Option<i64>,
    pub pos_180_degrees: Option<i64>,
    pub pos_270_degrees: Option<i64>,
    pub full_rotation_count: Option<i64>,

    pub position_hysteresis: Option<u32>,
    pub max_speed: Option<f32>,
    pub acceleration: Option<f32>,
    pub vel_loop_p: Option<f32>,
    pub vel_loop_i: Option<f32>,
    pub vel_loop_d: Option<f32>,
    pub vel_filter_persistence: Option<f32>,
    pub spd_err_persistence: Option<f32>,

    pub rotation_interval: Option<u64>,
    pub auto_rotation_enabled: Option<bool>,
    pub auto_rotate_forward: Option<bool>,
}

pub fn load_settings(s: &str) -> Result<SettingsUpdate, toml::de::Error> {
    toml::from_str::<SettingsUpdate>(s)
}

impl SettingsUpdate {
    /// Whether any of the four `pos_*_degrees` references is set.
    pub fn touches_references(&self) -> bool {
        self.pos_0_degrees.is_some()
            || self.pos_90_degrees.is_some()
            || self.pos_180_degrees.is_some()
            || self.pos_270_degrees.is_some()
    }

    pub fn touches_calibration(&self) -> bool {
        self.touches_references() || self.full_rotation_count.is_some()
    }

    pub fn touches_motion(&self) -> bool {
        self.position_hysteresis.is_some()
            || self.max_speed.is_some()
            || self.acceleration.is_some()
            || self.vel_loop_p.is_some()
            || self.vel_loop_i.is_some()
            || self.vel_loop_d.is_some()
            || self.vel_filter_persistence.is_some()
            || self.spd_err_persistence.is_some()
    }

    pub fn touches_rotation(&self) -> bool {
        self.rotation_interval.is_some()
            || self.auto_rotation_enabled.is_some()
            || self.auto_rotate_forward.is_some()
    }
}

fn set<T: Copy>(slot: &mut T, v: Option<T>) {
    if let Some(v) = v {
        *slot = v;
    }
}

impl Config {
    /// Apply a partial update. When it moves a reference position the
    /// full-rotation count is re-derived from the references, unless the
    /// update sets `full_rotation_count` itself.
    ///
    /// The result is validated as a whole; on error `self` is left unchanged.
    pub fn apply(&mut self, update: &SettingsUpdate) -> eyre::Result<()> {
        let mut next = self.clone();

        let cal = &mut next.calibration;
        set(&mut cal.pos_0_degrees, update.pos_0_degrees);
        set(&mut cal.pos_90_degrees, update.pos_90_degrees);
        set(&mut cal.pos_180_degrees, update.pos_180_degrees);
        set(&mut cal.pos_270_degrees, update.pos_270_degrees);
        if let Some(frc) = update.full_rotation_count {
            cal.full_rotation_count = frc;
        } else if update.touches_references() {
            cal.full_rotation_count = cal.derived_full_rotation_count();
        }

        let m = &mut next.motion;
        set(&mut m.position_hysteresis, update.position_hysteresis);
        set(&mut m.max_speed, update.max_speed);
        set(&mut m.acceleration, update.acceleration);
        set(&mut m.vel_loop_p, update.vel_loop_p);
        set(&mut m.vel_loop_i, update.vel_loop_i);
        set(&mut m.vel_loop_d, update.vel_loop_d);
        set(&mut m.vel_filter_persistence, update.vel_filter_persistence);
        set(&mut m.spd_err_persistence, update.spd_err_persistence);

        let r = &mut next.rotation;
        set(&mut r.rotation_interval, update.rotation_interval);
        set(&mut r.auto_rotation_enabled, update.auto_rotation_enabled);
        set(&mut r.auto_rotate_forward, update.auto_rotate_forward);

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Make `current` the 0 degree reference.
    pub fn set_zero(&mut self, current: i64) {
        self.calibration.set_zero(current);
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Calibration
        if self.calibration.full_rotation_count <= 0 {
            eyre::bail!(
                "calibration.full_rotation_count must be > 0 (got {})",
                self.calibration.full_rotation_count
            );
        }

        // Motion
        let m = &self.motion;
        if !(m.max_speed.is_finite() && m.max_speed > 0.0) {
            eyre::bail!("motion.max_speed must be > 0");
        }
        if !(m.acceleration.is_finite() && m.acceleration > 0.0) {
            eyre::bail!("motion.acceleration must be > 0");
        }
        for (name, gain) in [
            ("vel_loop_p", m.vel_loop_p),
            ("vel_loop_i", m.vel_loop_i),
            ("vel_loop_d", m.vel_loop_d),
        ] {
            if !gain.is_finite() {
                eyre::bail!("motion.{name} must be finite");
            }
        }
        if !(0.0..1.0).contains(&m.vel_filter_persistence) {
            eyre::bail!("motion.vel_filter_persistence must be in [0.0, 1.0)");
        }
        if !(0.0..1.0).contains(&m.spd_err_persistence) {
            eyre::bail!("motion.spd_err_persistence must be in [0.0, 1.0)");
        }
        if i64::from(m.position_hysteresis) * 2 >= self.calibration.full_rotation_count {
            eyre::bail!("motion.position_hysteresis must be smaller than half a revolution");
        }

        // Rotation
        if self.rotation.rotation_interval == 0 {
            eyre::bail!("rotation.rotation_interval must be >= 1");
        }

        // Scheduler
        let s = &self.scheduler;
        for (name, ms) in [
            ("encoder_ms", s.encoder_ms),
            ("control_ms", s.control_ms),
            ("auto_rotation_ms", s.auto_rotation_ms),
            ("telemetry_ms", s.telemetry_ms),
            ("status_ms", s.status_ms),
        ] {
            if ms == 0 {
                eyre::bail!("scheduler.{name} must be >= 1");
            }
            if ms > 60 * 1000 {
                eyre::bail!("scheduler.{name} is unreasonably large (>60s)");
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly (got {rot:?})");
        }

        // Simulation
        let sim = &self.simulation;
        if !(sim.free_speed.is_finite() && sim.free_speed > 0.0) {
            eyre::bail!("simulation.free_speed must be > 0");
        }
        if !(sim.time_constant_s.is_finite() && sim.time_constant_s >= 0.0) {
            eyre::bail!("simulation.time_constant_s must be >= 0");
        }

        // Pins
        if self.pins.encoder_a == self.pins.encoder_b {
            eyre::bail!("pins.encoder_a and pins.encoder_b must differ");
        }
        if !(self.pins.pwm_frequency_hz.is_finite() && self.pins.pwm_frequency_hz > 0.0) {
            eyre::bail!("pins.pwm_frequency_hz must be > 0");
        }

        Ok(())
    }
}
