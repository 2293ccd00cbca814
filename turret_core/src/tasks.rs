//! The periodic tasks that make up a turret, as executor closures.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crossbeam_channel as xch;
use turret_traits::{Encoder, Indicator, MotorDriver};

use crate::auto_rotation::AutoRotation;
use crate::controller::MotionController;
use crate::error::Result;
use crate::handle::{Command, MotionHandle};
use crate::hw_error::map_hw_error;
use crate::shared::{MotionInfo, MotionShared};
use crate::status::MotionStatus;
use crate::velocity::VelocityEstimator;

/// Sample the encoder and refresh the shared velocity estimate.
pub(crate) fn encoder_task(
    encoder: Arc<dyn Encoder>,
    shared: Arc<MotionShared>,
) -> impl FnMut(Instant) -> Result<()> + Send + 'static {
    let mut estimator =
        VelocityEstimator::new(shared.vel_filter_persistence.load(Ordering::Relaxed));
    move |now| {
        let count = encoder
            .count()
            .saturating_add(shared.rebase_total.load(Ordering::Acquire));
        estimator.set_persistence(shared.vel_filter_persistence.load(Ordering::Relaxed));
        let v = estimator.sample(count, now);
        shared.velocity.store(v, Ordering::Relaxed);
        Ok(())
    }
}

/// Drain queued commands, then run one control tick.
pub(crate) fn control_task<M>(
    mut controller: MotionController<M>,
    rx: xch::Receiver<Command>,
    shared: Arc<MotionShared>,
) -> impl FnMut(Instant) -> Result<()> + Send + 'static
where
    M: MotorDriver + Send + 'static,
{
    move |now| {
        for cmd in rx.try_iter() {
            controller.apply(cmd, now);
        }
        let measured = shared.velocity.load(Ordering::Relaxed);
        if let MotionStatus::Arrived { position } = controller.tick(now, measured)? {
            tracing::debug!(position, "control task observed arrival");
        }
        Ok(())
    }
}

pub(crate) fn auto_rotation_task(
    handle: MotionHandle,
) -> impl FnMut(Instant) -> Result<()> + Send + 'static {
    let mut auto = AutoRotation::new(handle);
    move |_now| auto.check().map(|_| ())
}

/// Push a telemetry snapshot; drops it when the consumer lags.
pub(crate) fn telemetry_task(
    handle: MotionHandle,
    tx: xch::Sender<MotionInfo>,
) -> impl FnMut(Instant) -> Result<()> + Send + 'static {
    let mut dropped: u64 = 0;
    move |_now| {
        match tx.try_send(handle.motion_info()) {
            Ok(()) => {}
            Err(xch::TrySendError::Full(_)) => {
                dropped += 1;
                tracing::trace!(dropped, "telemetry consumer lagging");
            }
            // nobody listening; nothing to do
            Err(xch::TrySendError::Disconnected(_)) => {}
        }
        Ok(())
    }
}

/// Toggle the heartbeat and show the latest commanded angle when it changes.
pub(crate) fn status_task(
    mut indicator: Box<dyn Indicator + Send>,
    shared: Arc<MotionShared>,
) -> impl FnMut(Instant) -> Result<()> + Send + 'static {
    let mut beat = false;
    let mut shown: Option<u16> = None;
    move |_now| {
        beat = !beat;
        indicator
            .set_heartbeat(beat)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
        let latest = shared.last_angle();
        if latest != shown
            && let Some(angle) = latest
        {
            indicator
                .show_angle(angle)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
            shown = latest;
        }
        Ok(())
    }
}

/// Indicator used when none is configured.
pub(crate) struct NullIndicator;

impl Indicator for NullIndicator {
    fn set_heartbeat(
        &mut self,
        _on: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }

    fn show_angle(
        &mut self,
        _angle: u16,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}
