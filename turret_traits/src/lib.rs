pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Quadrature encoder counter.
///
/// Implementations are shared between the sampling task, the control task and
/// external readers, so every method takes `&self` and must be interrupt-safe
/// (reads never tear).
pub trait Encoder: Send + Sync {
    /// Current raw count. Unbounded, continuous across revolutions.
    fn count(&self) -> i64;

    /// Overwrite the raw count (used by counter rebasing).
    fn set_count(
        &self,
        count: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// H-bridge style DC motor driver.
pub trait MotorDriver {
    /// Apply a normalized drive command in `[-1.0, 1.0]`; 0.0 stops (coast).
    fn set_drive(&mut self, command: f32) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Status indicator: a heartbeat output plus a per-angle display.
pub trait Indicator {
    fn set_heartbeat(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn show_angle(&mut self, angle: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: Encoder + ?Sized> Encoder for std::sync::Arc<T> {
    fn count(&self) -> i64 {
        (**self).count()
    }

    fn set_count(
        &self,
        count: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_count(count)
    }
}

impl<T: MotorDriver + ?Sized> MotorDriver for Box<T> {
    fn set_drive(&mut self, command: f32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_drive(command)
    }
}

impl<T: Indicator + ?Sized> Indicator for Box<T> {
    fn set_heartbeat(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_heartbeat(on)
    }

    fn show_angle(&mut self, angle: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).show_angle(angle)
    }
}
