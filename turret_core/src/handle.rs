//! Cloneable command/query entry point into a running turret.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crossbeam_channel as xch;
use turret_traits::{Clock, Encoder};

use crate::calibration::Calibration;
use crate::config::{RotationSchedule, TuningParams};
use crate::error::{Result, TurretError};
use crate::position::{PositionModel, is_quarter};
use crate::shared::{MotionInfo, MotionShared};

/// Commands consumed by the control task at the start of its next tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    MoveTo(i64),
    Rotate(u16),
    SetTuning(TuningParams),
    SetCalibration(Calibration),
    SetFullRotationCount(i64),
    SetZero,
}

impl Command {
    /// Move and rotate commands count as motion until the control task has
    /// taken them.
    pub(crate) const fn is_motion(&self) -> bool {
        matches!(self, Self::MoveTo(_) | Self::Rotate(_))
    }
}

/// Handle used by callers and by the auto-rotation task alike.
///
/// Commands never block; they take effect on the next control tick.
#[derive(Clone)]
pub struct MotionHandle {
    tx: xch::Sender<Command>,
    shared: Arc<MotionShared>,
    encoder: Arc<dyn Encoder>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for MotionHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotionHandle")
            .field("active", &self.is_active())
            .field("position", &self.current_position())
            .finish_non_exhaustive()
    }
}

impl MotionHandle {
    pub(crate) fn new(
        tx: xch::Sender<Command>,
        shared: Arc<MotionShared>,
        encoder: Arc<dyn Encoder>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            tx,
            shared,
            encoder,
            clock,
        }
    }

    fn send(&self, cmd: Command) -> Result<()> {
        let motion = cmd.is_motion();
        if motion {
            self.shared.pending.fetch_add(1, Ordering::AcqRel);
        }
        self.tx.send(cmd).map_err(|_| {
            if motion {
                self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            }
            eyre::Report::new(TurretError::State("motion task has stopped".into()))
        })
    }

    /// Move to an absolute encoder count, overriding any move in flight.
    pub fn move_to(&self, position: i64) -> Result<()> {
        tracing::debug!(position, "move_to");
        self.send(Command::MoveTo(position))
    }

    /// Rotate to a quarter-turn angle along the shorter way round.
    pub fn rotate_to_angle(&self, angle: u16) -> Result<()> {
        if !is_quarter(angle) {
            return Err(eyre::Report::new(TurretError::InvalidAngle(angle)));
        }
        let frc = self.shared.full_rotation_count.load(Ordering::Acquire);
        if frc <= 0 {
            return Err(eyre::Report::new(TurretError::Calibration(format!(
                "full_rotation_count is {frc}"
            ))));
        }
        tracing::debug!(angle, "rotate_to_angle");
        self.send(Command::Rotate(angle))
    }

    pub fn current_position(&self) -> i64 {
        self.encoder.count()
    }

    /// Current angle relative to the zero reference; 0 if uncalibrated.
    pub fn current_angle(&self) -> u16 {
        let m = PositionModel::new(self.shared.full_rotation_count.load(Ordering::Acquire));
        let zero = self.shared.zero_position.load(Ordering::Acquire);
        m.to_angle(self.current_position().saturating_sub(zero))
    }

    /// Filtered velocity in counts/s.
    pub fn velocity(&self) -> f32 {
        self.shared.velocity.load(Ordering::Relaxed)
    }

    /// True while moving or while a move/rotate command is still queued.
    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    pub fn motion_info(&self) -> MotionInfo {
        let s = &self.shared;
        MotionInfo {
            active: s.is_active(),
            target: s.target.load(Ordering::Acquire),
            position: self.current_position(),
            velocity: s.velocity.load(Ordering::Relaxed),
            error: s.error.load(Ordering::Relaxed),
            integral: s.integral.load(Ordering::Relaxed),
            derivative: s.derivative.load(Ordering::Relaxed),
            drive: s.drive.load(Ordering::Relaxed),
        }
    }

    pub fn set_tuning(&self, tuning: TuningParams) -> Result<()> {
        tuning
            .validate()
            .map_err(|m| eyre::Report::new(TurretError::Config(m.into())))?;
        self.send(Command::SetTuning(tuning))
    }

    pub fn set_calibration(&self, calibration: Calibration) -> Result<()> {
        self.send(Command::SetCalibration(calibration))
    }

    pub fn set_full_rotation_count(&self, full_rotation_count: i64) -> Result<()> {
        self.send(Command::SetFullRotationCount(full_rotation_count))
    }

    /// Make the current position the 0 degree reference.
    pub fn set_zero(&self) -> Result<()> {
        self.send(Command::SetZero)
    }

    pub fn rotation_schedule(&self) -> RotationSchedule {
        self.shared.schedule()
    }

    pub fn set_rotation_schedule(&self, schedule: RotationSchedule) {
        tracing::info!(
            enabled = schedule.enabled,
            forward = schedule.forward,
            interval_s = schedule.interval_s,
            "rotation schedule updated"
        );
        self.shared.set_schedule(schedule);
    }

    /// Milliseconds since the last rotate command was taken by the control task.
    pub fn ms_since_last_rotation(&self) -> u64 {
        let last = self.shared.last_rotation_ms.load(Ordering::Acquire);
        self.clock.ms_since(self.shared.epoch).saturating_sub(last)
    }

    /// Quarter angle of the most recent rotate command, if any.
    pub fn last_angle(&self) -> Option<u16> {
        self.shared.last_angle()
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }
}
