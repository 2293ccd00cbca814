//! Lock-free state published by the tasks and read by handles.
//!
//! Every field has exactly one writing task (noted per field); readers may be
//! on any thread.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use crate::atomic::AtomicF32;
use crate::calibration::Calibration;
use crate::config::RotationSchedule;
use crate::pid::PidOutput;

/// Point-in-time telemetry snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionInfo {
    pub active: bool,
    pub target: i64,
    pub position: i64,
    /// counts/s
    pub velocity: f32,
    pub error: f32,
    pub integral: f32,
    pub derivative: f32,
    pub drive: f32,
}

const NO_ANGLE: u32 = u32::MAX;

#[derive(Debug)]
pub struct MotionShared {
    /// Time origin of the `*_ms` fields.
    pub(crate) epoch: Instant,

    // control task
    pub(crate) active: AtomicBool,
    pub(crate) target: AtomicI64,
    pub(crate) error: AtomicF32,
    pub(crate) integral: AtomicF32,
    pub(crate) derivative: AtomicF32,
    pub(crate) drive: AtomicF32,
    pub(crate) full_rotation_count: AtomicI64,
    pub(crate) zero_position: AtomicI64,
    pub(crate) rebase_total: AtomicI64,
    pub(crate) vel_filter_persistence: AtomicF32,
    pub(crate) last_rotation_ms: AtomicU64,
    pub(crate) last_angle: AtomicU32,

    // handles increment on send, control task decrements on receipt
    pub(crate) pending: AtomicU64,

    // encoder task
    pub(crate) velocity: AtomicF32,

    // rotation schedule, set through handles
    pub(crate) schedule_enabled: AtomicBool,
    pub(crate) schedule_forward: AtomicBool,
    pub(crate) schedule_interval_s: AtomicU64,
}

impl MotionShared {
    pub fn new(
        epoch: Instant,
        calibration: &Calibration,
        vel_filter_persistence: f32,
        schedule: RotationSchedule,
    ) -> Self {
        Self {
            epoch,
            active: AtomicBool::new(false),
            target: AtomicI64::new(0),
            error: AtomicF32::new(0.0),
            integral: AtomicF32::new(0.0),
            derivative: AtomicF32::new(0.0),
            drive: AtomicF32::new(0.0),
            full_rotation_count: AtomicI64::new(calibration.full_rotation_count),
            zero_position: AtomicI64::new(calibration.pos_0),
            rebase_total: AtomicI64::new(0),
            vel_filter_persistence: AtomicF32::new(vel_filter_persistence),
            last_rotation_ms: AtomicU64::new(0),
            last_angle: AtomicU32::new(NO_ANGLE),
            pending: AtomicU64::new(0),
            velocity: AtomicF32::new(0.0),
            schedule_enabled: AtomicBool::new(schedule.enabled),
            schedule_forward: AtomicBool::new(schedule.forward),
            schedule_interval_s: AtomicU64::new(schedule.interval_s),
        }
    }

    /// Active, or a move/rotate command is queued but not yet consumed.
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) || self.pending.load(Ordering::Acquire) > 0
    }

    pub(crate) fn publish_calibration(&self, cal: &Calibration) {
        self.full_rotation_count
            .store(cal.full_rotation_count, Ordering::Release);
        self.zero_position.store(cal.pos_0, Ordering::Release);
    }

    pub(crate) fn publish_pid(&self, out: &PidOutput, drive: f32) {
        self.error.store(out.error, Ordering::Relaxed);
        self.integral.store(out.integral, Ordering::Relaxed);
        self.derivative.store(out.derivative, Ordering::Relaxed);
        self.drive.store(drive, Ordering::Relaxed);
    }

    pub(crate) fn clear_pid(&self) {
        self.publish_pid(&PidOutput::default(), 0.0);
    }

    pub(crate) fn last_angle(&self) -> Option<u16> {
        u16::try_from(self.last_angle.load(Ordering::Acquire)).ok()
    }

    pub(crate) fn set_last_angle(&self, angle: u16) {
        self.last_angle.store(u32::from(angle), Ordering::Release);
    }

    pub(crate) fn schedule(&self) -> RotationSchedule {
        RotationSchedule {
            interval_s: self.schedule_interval_s.load(Ordering::Relaxed),
            enabled: self.schedule_enabled.load(Ordering::Relaxed),
            forward: self.schedule_forward.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn set_schedule(&self, s: RotationSchedule) {
        self.schedule_interval_s.store(s.interval_s, Ordering::Relaxed);
        self.schedule_forward.store(s.forward, Ordering::Relaxed);
        self.schedule_enabled.store(s.enabled, Ordering::Relaxed);
    }
}
