pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod quadrature;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use turret_traits::{Clock, Encoder, Indicator, MotorDriver};

use crate::error::HwError;

/// Physical parameters of the simulated DC motor + gearbox.
#[derive(Debug, Clone, Copy)]
pub struct PlantParams {
    /// Steady-state speed at full drive, in encoder counts per second.
    pub free_speed: f64,
    /// First-order mechanical time constant in seconds; 0 means velocity
    /// follows the drive instantly.
    pub time_constant_s: f64,
    /// Encoder count at power-up.
    pub initial_count: i64,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            free_speed: 8000.0,
            time_constant_s: 0.0,
            initial_count: 0,
        }
    }
}

#[derive(Debug)]
struct PlantState {
    position: f64,
    velocity: f64,
    drive: f64,
    updated_at: Instant,
}

/// Simulated DC motor driving a quadrature encoder.
///
/// State is integrated lazily up to `clock.now()` whenever it is observed or
/// the drive changes, so the plant works the same under a real or a manual
/// clock. Hand out the encoder and motor halves with [`encoder`](Self::encoder)
/// and [`motor`](Self::motor).
#[derive(Clone)]
pub struct SimulatedPlant {
    state: Arc<Mutex<PlantState>>,
    params: PlantParams,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SimulatedPlant {
    pub fn new(params: PlantParams, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let state = PlantState {
            position: params.initial_count as f64,
            velocity: 0.0,
            drive: 0.0,
            updated_at: clock.now(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            params,
            clock,
        }
    }

    pub fn encoder(&self) -> SimulatedEncoder {
        SimulatedEncoder {
            plant: self.clone(),
        }
    }

    pub fn motor(&self) -> SimulatedMotor {
        SimulatedMotor {
            plant: self.clone(),
            faulted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Continuous shaft position in counts.
    pub fn position(&self) -> f64 {
        self.advanced().position
    }

    /// Shaft velocity in counts per second.
    pub fn velocity(&self) -> f64 {
        self.advanced().velocity
    }

    /// Drive command currently applied.
    pub fn drive(&self) -> f64 {
        self.advanced().drive
    }

    fn lock(&self) -> MutexGuard<'_, PlantState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advanced(&self) -> MutexGuard<'_, PlantState> {
        let mut st = self.lock();
        self.integrate(&mut st);
        st
    }

    fn integrate(&self, st: &mut PlantState) {
        let now = self.clock.now();
        let dt = now.saturating_duration_since(st.updated_at).as_secs_f64();
        st.updated_at = now;
        if dt <= 0.0 {
            return;
        }
        let v_ss = st.drive * self.params.free_speed;
        let tau = self.params.time_constant_s;
        if tau <= 0.0 {
            st.velocity = v_ss;
            st.position += v_ss * dt;
        } else {
            let decay = (-dt / tau).exp();
            st.position += v_ss * dt + (st.velocity - v_ss) * tau * (1.0 - decay);
            st.velocity = v_ss + (st.velocity - v_ss) * decay;
        }
    }
}

/// Encoder half of a [`SimulatedPlant`].
#[derive(Clone)]
pub struct SimulatedEncoder {
    plant: SimulatedPlant,
}

impl Encoder for SimulatedEncoder {
    fn count(&self) -> i64 {
        self.plant.advanced().position.floor() as i64
    }

    fn set_count(&self, count: i64) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.plant.advanced();
        let frac = st.position - st.position.floor();
        st.position = count as f64 + frac;
        tracing::debug!(count, "simulated encoder count overwritten");
        Ok(())
    }
}

/// Motor half of a [`SimulatedPlant`]. Faults can be injected for tests.
pub struct SimulatedMotor {
    plant: SimulatedPlant,
    faulted: Arc<AtomicBool>,
}

impl SimulatedMotor {
    /// Shared switch that makes every subsequent `set_drive` fail.
    pub fn fault_switch(&self) -> Arc<AtomicBool> {
        self.faulted.clone()
    }
}

impl MotorDriver for SimulatedMotor {
    fn set_drive(&mut self, command: f32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.faulted.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Fault("simulated driver fault".into())));
        }
        let cmd = if command.is_finite() {
            f64::from(command.clamp(-1.0, 1.0))
        } else {
            0.0
        };
        let mut st = self.plant.advanced();
        st.drive = cmd;
        tracing::trace!(drive = cmd, "simulated motor drive");
        Ok(())
    }
}

/// Indicator that only logs; remembers the last displayed angle.
#[derive(Debug, Clone)]
pub struct LogIndicator {
    last_angle: Arc<AtomicU32>,
    heartbeat: Arc<AtomicBool>,
}

impl Default for LogIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl LogIndicator {
    pub fn new() -> Self {
        Self {
            last_angle: Arc::new(AtomicU32::new(u32::MAX)),
            heartbeat: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Last angle shown, if any.
    pub fn last_angle(&self) -> Option<u16> {
        u16::try_from(self.last_angle.load(Ordering::Relaxed)).ok()
    }

    pub fn heartbeat(&self) -> bool {
        self.heartbeat.load(Ordering::Relaxed)
    }
}

impl Indicator for LogIndicator {
    fn set_heartbeat(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.heartbeat.store(on, Ordering::Relaxed);
        tracing::trace!(on, "heartbeat");
        Ok(())
    }

    fn show_angle(&mut self, angle: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.last_angle.store(u32::from(angle), Ordering::Relaxed);
        tracing::info!(angle, "indicator angle");
        Ok(())
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use hardware::{GpioIndicator, PwmMotor};
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use quadrature::QuadratureEncoder;

#[cfg(all(feature = "hardware", target_os = "linux"))]
mod hardware {
    use rppal::gpio::{Gpio, OutputPin};
    use rppal::pwm::{Channel, Polarity, Pwm};
    use turret_traits::{Indicator, MotorDriver};

    use crate::error::{HwError, Result};

    /// H-bridge driven by the two hardware PWM channels.
    ///
    /// Forward holds A fully on and modulates B; reverse mirrors it; zero
    /// releases both (coast).
    pub struct PwmMotor {
        a: Pwm,
        b: Pwm,
    }

    impl PwmMotor {
        pub fn new(frequency_hz: f64) -> Result<Self> {
            let open = |ch| {
                Pwm::with_frequency(ch, frequency_hz, 0.0, Polarity::Normal, true)
                    .map_err(|e| HwError::Pwm(e.to_string()))
            };
            Ok(Self {
                a: open(Channel::Pwm0)?,
                b: open(Channel::Pwm1)?,
            })
        }

        fn apply(&self, a: f64, b: f64) -> Result<()> {
            self.a
                .set_duty_cycle(a)
                .map_err(|e| HwError::Pwm(e.to_string()))?;
            self.b
                .set_duty_cycle(b)
                .map_err(|e| HwError::Pwm(e.to_string()))
        }
    }

    impl MotorDriver for PwmMotor {
        fn set_drive(
            &mut self,
            command: f32,
        ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let s = if command.is_finite() {
                f64::from(command.clamp(-1.0, 1.0))
            } else {
                0.0
            };
            if s > 0.0 {
                self.apply(1.0, 1.0 - s)?;
            } else if s < 0.0 {
                self.apply(1.0 + s, 1.0)?;
            } else {
                self.apply(0.0, 0.0)?;
            }
            Ok(())
        }
    }

    /// Heartbeat LED on a GPIO output; angle display is logged only.
    pub struct GpioIndicator {
        led: OutputPin,
    }

    impl GpioIndicator {
        pub fn new(pin: u8) -> Result<Self> {
            let led = Gpio::new()
                .and_then(|g| g.get(pin))
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low();
            Ok(Self { led })
        }
    }

    impl Indicator for GpioIndicator {
        fn set_heartbeat(
            &mut self,
            on: bool,
        ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if on {
                self.led.set_high();
            } else {
                self.led.set_low();
            }
            Ok(())
        }

        fn show_angle(
            &mut self,
            angle: u16,
        ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            tracing::info!(angle, "indicator angle");
            Ok(())
        }
    }
}
