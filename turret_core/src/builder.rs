//! Type-state builder for `Turret`.
//!
//! The builder enforces at compile time that an encoder and a motor are
//! provided before `build()` is available. `try_build()` is always available
//! for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as xch;
use turret_traits::{Clock, Encoder, Indicator, MonotonicClock, MotorDriver};

use crate::calibration::Calibration;
use crate::config::{RotationSchedule, SchedulerCfg, TuningParams, UnwrapStrategy};
use crate::controller::MotionController;
use crate::error::{BuildError, Result};
use crate::executor::{Executor, TaskStats};
use crate::handle::MotionHandle;
use crate::position::snap_to_quarter;
use crate::runtime::TurretRuntime;
use crate::shared::{MotionInfo, MotionShared};
use crate::tasks;

/// Default depth of the telemetry channel.
const TELEMETRY_CAPACITY: usize = 64;

// ── Assembled turret ─────────────────────────────────────────────────────────

/// A fully wired turret: executor with all tasks, a command handle and the
/// telemetry stream. Drive it in place (`run_*`) or hand it to a background
/// thread with `spawn`.
pub struct Turret {
    executor: Executor,
    handle: MotionHandle,
    telemetry: xch::Receiver<MotionInfo>,
}

impl core::fmt::Debug for Turret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Turret")
            .field("handle", &self.handle)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl Turret {
    /// Start building a Turret.
    pub fn builder() -> TurretBuilder<Missing, Missing> {
        TurretBuilder::default()
    }

    pub fn handle(&self) -> MotionHandle {
        self.handle.clone()
    }

    pub fn telemetry(&self) -> xch::Receiver<MotionInfo> {
        self.telemetry.clone()
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        self.executor.clock()
    }

    /// Run every task that is due now.
    pub fn run_pending(&mut self) -> usize {
        self.executor.run_pending()
    }

    pub fn run_until<F: FnMut() -> bool>(&mut self, stop: F) {
        self.executor.run_until(stop);
    }

    pub fn run_for(&mut self, d: Duration) {
        self.executor.run_for(d);
    }

    /// Run until the current move (and any queued one) has finished, or
    /// `limit` of clock time has passed. Returns whether motion finished.
    pub fn run_until_idle(&mut self, limit: Duration) -> bool {
        let handle = self.handle.clone();
        let clock = self.executor.clock().clone();
        let end = clock.now() + limit;
        self.executor
            .run_until(|| !handle.is_active() || clock.now() >= end);
        !self.handle.is_active()
    }

    pub fn stats(&self) -> Vec<TaskStats> {
        self.executor.stats()
    }

    /// Move the executor onto a background thread.
    pub fn spawn(self) -> TurretRuntime {
        TurretRuntime::spawn(self.executor, self.handle, self.telemetry)
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Turret`. All fields are validated on `build()`.
pub struct TurretBuilder<E, M> {
    encoder: Option<Arc<dyn Encoder>>,
    motor: Option<Box<dyn MotorDriver + Send>>,
    indicator: Option<Box<dyn Indicator + Send>>,
    tuning: Option<TuningParams>,
    calibration: Option<Calibration>,
    schedule: Option<RotationSchedule>,
    scheduler: Option<SchedulerCfg>,
    unwrap: Option<UnwrapStrategy>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    telemetry_capacity: Option<usize>,
    _e: PhantomData<E>,
    _m: PhantomData<M>,
}

impl Default for TurretBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            encoder: None,
            motor: None,
            indicator: None,
            tuning: None,
            calibration: None,
            schedule: None,
            scheduler: None,
            unwrap: None,
            clock: None,
            telemetry_capacity: None,
            _e: PhantomData,
            _m: PhantomData,
        }
    }
}

fn validate(
    tuning: &TuningParams,
    scheduler: &SchedulerCfg,
    schedule: &RotationSchedule,
) -> Result<()> {
    tuning
        .validate()
        .map_err(|m| eyre::Report::new(BuildError::InvalidConfig(m)))?;
    let periods = [
        scheduler.encoder,
        scheduler.control,
        scheduler.auto_rotation,
        scheduler.telemetry,
        scheduler.status,
    ];
    if periods.iter().any(Duration::is_zero) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "task periods must be > 0",
        )));
    }
    if schedule.interval_s == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "rotation interval must be >= 1 s",
        )));
    }
    Ok(())
}

impl<E, M> TurretBuilder<E, M> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Turret> {
        let encoder = self
            .encoder
            .ok_or_else(|| eyre::Report::new(BuildError::MissingEncoder))?;
        let motor = self
            .motor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMotor))?;
        let tuning = self.tuning.unwrap_or_default();
        let calibration = self.calibration.unwrap_or_default();
        let schedule = self.schedule.unwrap_or_default();
        let scheduler = self.scheduler.unwrap_or_default();
        validate(&tuning, &scheduler, &schedule)?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let now = clock.now();

        let shared = Arc::new(MotionShared::new(
            now,
            &calibration,
            tuning.vel_filter_persistence,
            schedule,
        ));
        if calibration.is_calibrated() {
            shared.set_last_angle(snap_to_quarter(calibration.angle_of(encoder.count())));
        } else {
            tracing::warn!("turret is not calibrated; angle commands will be rejected");
        }

        let (cmd_tx, cmd_rx) = xch::unbounded();
        let capacity = self
            .telemetry_capacity
            .unwrap_or(TELEMETRY_CAPACITY)
            .max(1);
        let (tel_tx, tel_rx) = xch::bounded(capacity);
        let handle = MotionHandle::new(cmd_tx, shared.clone(), encoder.clone(), clock.clone());

        let controller = MotionController::new(
            encoder.clone(),
            motor,
            tuning,
            calibration,
            self.unwrap.unwrap_or_default(),
            shared.clone(),
            now,
        );
        let indicator: Box<dyn Indicator + Send> = match self.indicator {
            Some(i) => i,
            None => Box::new(tasks::NullIndicator),
        };

        let mut executor = Executor::new(clock);
        executor
            .add_task(
                "encoder",
                scheduler.encoder,
                tasks::encoder_task(encoder, shared.clone()),
            )
            .add_task(
                "control",
                scheduler.control,
                tasks::control_task(controller, cmd_rx, shared.clone()),
            )
            .add_task(
                "auto_rotation",
                scheduler.auto_rotation,
                tasks::auto_rotation_task(handle.clone()),
            )
            .add_task(
                "telemetry",
                scheduler.telemetry,
                tasks::telemetry_task(handle.clone(), tel_tx),
            )
            .add_task("status", scheduler.status, tasks::status_task(indicator, shared));

        tracing::info!(
            full_rotation_count = calibration.full_rotation_count,
            auto_rotation = schedule.enabled,
            "turret assembled"
        );
        Ok(Turret {
            executor,
            handle,
            telemetry: tel_rx,
        })
    }
}

/// Chainable setters that do not affect type-state.
impl<E, M> TurretBuilder<E, M> {
    pub fn with_tuning(mut self, tuning: TuningParams) -> Self {
        self.tuning = Some(tuning);
        self
    }
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = Some(calibration);
        self
    }
    pub fn with_rotation(mut self, schedule: RotationSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }
    pub fn with_schedule(mut self, scheduler: SchedulerCfg) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
    pub fn with_unwrap(mut self, unwrap: UnwrapStrategy) -> Self {
        self.unwrap = Some(unwrap);
        self
    }
    pub fn with_indicator(mut self, indicator: impl Indicator + Send + 'static) -> Self {
        self.indicator = Some(Box::new(indicator));
        self
    }
    pub fn with_telemetry_capacity(mut self, capacity: usize) -> Self {
        self.telemetry_capacity = Some(capacity);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<M> TurretBuilder<Missing, M> {
    pub fn with_encoder(self, encoder: impl Encoder + 'static) -> TurretBuilder<Set, M> {
        TurretBuilder {
            encoder: Some(Arc::new(encoder)),
            motor: self.motor,
            indicator: self.indicator,
            tuning: self.tuning,
            calibration: self.calibration,
            schedule: self.schedule,
            scheduler: self.scheduler,
            unwrap: self.unwrap,
            clock: self.clock,
            telemetry_capacity: self.telemetry_capacity,
            _e: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<E> TurretBuilder<E, Missing> {
    pub fn with_motor(self, motor: impl MotorDriver + Send + 'static) -> TurretBuilder<E, Set> {
        TurretBuilder {
            encoder: self.encoder,
            motor: Some(Box::new(motor)),
            indicator: self.indicator,
            tuning: self.tuning,
            calibration: self.calibration,
            schedule: self.schedule,
            scheduler: self.scheduler,
            unwrap: self.unwrap,
            clock: self.clock,
            telemetry_capacity: self.telemetry_capacity,
            _e: PhantomData,
            _m: PhantomData,
        }
    }
}

impl TurretBuilder<Set, Set> {
    /// Validate and build the Turret. Only available when encoder and motor are set.
    pub fn build(self) -> Result<Turret> {
        self.try_build()
    }
}
