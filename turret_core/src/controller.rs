//! The motion state machine (`MotionController`).
//!
//! IDLE -> MOVING on any move command; MOVING -> IDLE once the encoder is
//! within the hysteresis band of the target. While moving, every tick
//! re-plans the velocity setpoint with the trapezoidal profile and closes the
//! velocity loop with the PID. A new command overrides the target in flight.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use eyre::WrapErr;
use turret_traits::{Encoder, MotorDriver};

use crate::calibration::Calibration;
use crate::config::{TuningParams, UnwrapStrategy};
use crate::error::Result;
use crate::handle::Command;
use crate::hw_error::map_hw_error;
use crate::pid::{PidState, VelocityPid};
use crate::profile::next_velocity;
use crate::shared::MotionShared;
use crate::status::MotionStatus;
use crate::util::elapsed_s;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionState {
    pub active: bool,
    pub target_position: i64,
    pub last_update: Instant,
}

pub struct MotionController<M: MotorDriver> {
    encoder: Arc<dyn Encoder>,
    motor: M,
    tuning: TuningParams,
    calibration: Calibration,
    unwrap: UnwrapStrategy,
    state: MotionState,
    pid: VelocityPid,
    /// Setpoint issued on the previous tick; the profile ramps from it.
    setpoint: f32,
    shared: Arc<MotionShared>,
}

impl<M: MotorDriver> core::fmt::Debug for MotionController<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotionController")
            .field("state", &self.state)
            .field("setpoint", &self.setpoint)
            .field("calibration", &self.calibration)
            .finish_non_exhaustive()
    }
}

impl<M: MotorDriver> MotionController<M> {
    pub fn new(
        encoder: Arc<dyn Encoder>,
        motor: M,
        tuning: TuningParams,
        calibration: Calibration,
        unwrap: UnwrapStrategy,
        shared: Arc<MotionShared>,
        now: Instant,
    ) -> Self {
        shared.publish_calibration(&calibration);
        shared
            .vel_filter_persistence
            .store(tuning.vel_filter_persistence, Ordering::Relaxed);
        Self {
            encoder,
            motor,
            pid: VelocityPid::new(tuning.pid_gains()),
            tuning,
            calibration,
            unwrap,
            state: MotionState {
                active: false,
                target_position: 0,
                last_update: now,
            },
            setpoint: 0.0,
            shared,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn pid_state(&self) -> PidState {
        self.pid.state()
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    pub fn tuning(&self) -> &TuningParams {
        &self.tuning
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Start (or retarget) a move. Resets the PID; keeps the setpoint so an
    /// override re-plans from the current motion.
    pub fn start_move(&mut self, target: i64, now: Instant) {
        self.state.target_position = target;
        self.state.last_update = now;
        self.state.active = true;
        self.pid.reset();
        self.shared.target.store(target, Ordering::Release);
        self.shared.active.store(true, Ordering::Release);
        tracing::info!(target, "motion start");
    }

    /// Resolve a quarter-turn angle to the nearest matching count and move
    /// there. Stamps the rotation time used by auto-rotation.
    pub fn rotate_to_angle(&mut self, angle: u16, now: Instant) -> Result<i64> {
        let current = self.encoder.count();
        let target = self
            .calibration
            .resolve_rotation(current, angle)
            .map_err(eyre::Report::new)
            .wrap_err("rotate_to_angle")?;
        tracing::info!(
            from = self.calibration.angle_of(current),
            to = angle,
            current,
            target,
            "rotating"
        );
        self.start_move(target, now);
        let ms = u64::try_from(now.saturating_duration_since(self.shared.epoch).as_millis())
            .unwrap_or(u64::MAX);
        self.shared.last_rotation_ms.store(ms, Ordering::Release);
        self.shared.set_last_angle(angle);
        Ok(target)
    }

    pub fn set_tuning(&mut self, tuning: TuningParams) {
        self.pid.set_gains(tuning.pid_gains());
        self.shared
            .vel_filter_persistence
            .store(tuning.vel_filter_persistence, Ordering::Relaxed);
        self.tuning = tuning;
        tracing::info!(?tuning, "tuning applied");
    }

    pub fn set_calibration(&mut self, calibration: Calibration) {
        if !calibration.is_calibrated() {
            tracing::warn!(
                full_rotation_count = calibration.full_rotation_count,
                "calibration has no valid revolution; angle commands will be rejected"
            );
        }
        self.calibration = calibration;
        self.shared.publish_calibration(&calibration);
        tracing::info!(?calibration, "calibration applied");
    }

    /// Make the current position the 0 degree reference.
    pub fn set_zero(&mut self) {
        let current = self.encoder.count();
        self.set_calibration(self.calibration.with_zero_at(current));
    }

    /// Apply one queued command.
    pub fn apply(&mut self, cmd: Command, now: Instant) {
        match cmd {
            Command::MoveTo(target) => self.start_move(target, now),
            Command::Rotate(angle) => {
                if let Err(e) = self.rotate_to_angle(angle, now) {
                    tracing::error!(angle, error = %e, "rotate command dropped");
                }
            }
            Command::SetTuning(t) => self.set_tuning(t),
            Command::SetCalibration(c) => self.set_calibration(c),
            Command::SetFullRotationCount(frc) => {
                let mut c = self.calibration;
                c.full_rotation_count = frc;
                self.set_calibration(c);
            }
            Command::SetZero => self.set_zero(),
        }
        if cmd.is_motion() {
            // after `active` is raised, so is_active() never reads a gap
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// One control tick. `measured_velocity` is the latest filtered estimate.
    pub fn tick(&mut self, now: Instant, measured_velocity: f32) -> Result<MotionStatus> {
        if !self.state.active {
            return Ok(MotionStatus::Idle);
        }

        let position = self.encoder.count();
        let remaining = self.state.target_position.saturating_sub(position);
        if remaining.unsigned_abs() <= u64::from(self.tuning.position_hysteresis) {
            self.arrive(position);
            return Ok(MotionStatus::Arrived { position });
        }

        let dt = elapsed_s(self.state.last_update, now);
        if dt <= 0.0 {
            return Ok(MotionStatus::Moving);
        }

        let v_target = next_velocity(
            position,
            self.state.target_position,
            self.setpoint,
            self.tuning.max_speed,
            self.tuning.acceleration,
            dt,
        );
        self.setpoint = v_target;
        let out = self.pid.update(v_target, measured_velocity, dt);
        let drive = if self.tuning.invert_drive {
            -out.drive
        } else {
            out.drive
        };

        if let Err(e) = self.set_drive(drive) {
            self.abort();
            return Err(e).wrap_err("motion aborted");
        }
        self.state.last_update = now;
        self.shared.publish_pid(&out, drive);
        tracing::trace!(position, v_target, measured_velocity, drive, "tick");
        Ok(MotionStatus::Moving)
    }

    /// Command zero drive (best-effort from callers' point of view).
    pub fn motor_stop(&mut self) -> Result<()> {
        self.set_drive(0.0).wrap_err("motor_stop")
    }

    fn set_drive(&mut self, drive: f32) -> Result<()> {
        self.motor
            .set_drive(drive)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
    }

    fn go_idle(&mut self) {
        self.state.active = false;
        self.pid.reset();
        self.setpoint = 0.0;
        self.shared.active.store(false, Ordering::Release);
        self.shared.clear_pid();
        if let Err(e) = self.motor_stop() {
            tracing::warn!(error = %e, "motor_stop failed");
        }
    }

    fn arrive(&mut self, position: i64) {
        self.go_idle();
        tracing::info!(
            position,
            target = self.state.target_position,
            "target reached"
        );
        if self.unwrap == UnwrapStrategy::Rebase {
            self.rebase(position);
        }
    }

    fn abort(&mut self) {
        tracing::error!(target = self.state.target_position, "motor driver error, aborting move");
        self.go_idle();
    }

    /// Pull the counter back one revolution toward `pos_0` when it has
    /// wandered more than a revolution away.
    fn rebase(&mut self, position: i64) {
        let frc = self.calibration.full_rotation_count;
        if frc <= 0 {
            return;
        }
        let rel = position.saturating_sub(self.calibration.pos_0);
        if rel.unsigned_abs() <= frc.unsigned_abs() {
            return;
        }
        let shift = if rel > 0 { frc } else { -frc };
        let rebased = position.saturating_sub(shift);
        match self.encoder.set_count(rebased) {
            Ok(()) => {
                self.shared.rebase_total.fetch_add(shift, Ordering::AcqRel);
                self.state.target_position = self.state.target_position.saturating_sub(shift);
                self.shared
                    .target
                    .store(self.state.target_position, Ordering::Release);
                tracing::debug!(from = position, to = rebased, "encoder rebased");
            }
            Err(e) => {
                tracing::warn!(error = %map_hw_error(&*e), "encoder rebase failed");
            }
        }
    }
}

impl<M: MotorDriver> Drop for MotionController<M> {
    fn drop(&mut self) {
        if let Err(e) = self.motor_stop() {
            tracing::warn!(error = %e, "motor_stop failed on drop");
        }
    }
}
