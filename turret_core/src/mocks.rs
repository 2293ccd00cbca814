//! Test and helper mocks for turret_core

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Encoder whose count is set directly by the test.
#[derive(Debug, Default, Clone)]
pub struct FixedEncoder {
    count: Arc<AtomicI64>,
}

impl FixedEncoder {
    pub fn new(count: i64) -> Self {
        Self {
            count: Arc::new(AtomicI64::new(count)),
        }
    }

    pub fn set(&self, count: i64) {
        self.count.store(count, Ordering::Relaxed);
    }
}

impl turret_traits::Encoder for FixedEncoder {
    fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    fn set_count(
        &self,
        count: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.set(count);
        Ok(())
    }
}

/// Motor that records every drive command; can be told to fail.
#[derive(Debug, Default, Clone)]
pub struct RecordingMotor {
    commands: Arc<Mutex<Vec<f32>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<f32> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<f32> {
        self.commands().last().copied()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl turret_traits::MotorDriver for RecordingMotor {
    fn set_drive(&mut self, command: f32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::other("driver fault")));
        }
        Ok(())
    }
}
