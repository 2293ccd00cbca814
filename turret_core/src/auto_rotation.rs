//! Periodic quarter-turn cycling while idle.

use crate::error::Result;
use crate::handle::MotionHandle;
use crate::position::{next_quarter, snap_to_quarter};
use crate::util::MILLIS_PER_SEC;

/// Issues the next quarter turn through a `MotionHandle` once the rotation
/// interval has elapsed, the schedule is enabled, and nothing is moving.
#[derive(Debug, Clone)]
pub struct AutoRotation {
    handle: MotionHandle,
}

impl AutoRotation {
    pub fn new(handle: MotionHandle) -> Self {
        Self { handle }
    }

    /// Run one check; returns the commanded angle when a rotation was issued.
    pub fn check(&mut self) -> Result<Option<u16>> {
        let schedule = self.handle.rotation_schedule();
        if !schedule.enabled || self.handle.is_active() {
            return Ok(None);
        }
        let elapsed_ms = self.handle.ms_since_last_rotation();
        if elapsed_ms < schedule.interval_s.saturating_mul(MILLIS_PER_SEC) {
            return Ok(None);
        }
        let current = snap_to_quarter(self.handle.current_angle());
        let next = next_quarter(current, schedule.forward);
        tracing::info!(
            elapsed_s = elapsed_ms / MILLIS_PER_SEC,
            from = current,
            to = next,
            "auto-rotation triggered"
        );
        self.handle.rotate_to_angle(next)?;
        Ok(Some(next))
    }
}
