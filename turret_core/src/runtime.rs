//! Background executor thread.
//!
//! `TurretRuntime` owns exactly one thread running the executor. Dropping it
//! (or calling `shutdown`) raises the stop flag and joins the thread; the
//! control task, and with it the motor driver, is dropped on that thread,
//! which commands zero drive.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel as xch;

use crate::executor::{Executor, TaskStats};
use crate::handle::MotionHandle;
use crate::shared::MotionInfo;

pub struct TurretRuntime {
    handle: MotionHandle,
    telemetry: xch::Receiver<MotionInfo>,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<Vec<TaskStats>>>,
}

impl TurretRuntime {
    pub(crate) fn spawn(
        mut executor: Executor,
        handle: MotionHandle,
        telemetry: xch::Receiver<MotionInfo>,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let join_handle = std::thread::spawn(move || {
            executor.run_until(|| shutdown_clone.load(Ordering::Relaxed));
            tracing::debug!("executor thread received shutdown signal");
            executor.stats()
        });
        Self {
            handle,
            telemetry,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    pub fn handle(&self) -> MotionHandle {
        self.handle.clone()
    }

    pub fn telemetry(&self) -> &xch::Receiver<MotionInfo> {
        &self.telemetry
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stop the executor and return its final task counters.
    pub fn shutdown(mut self) -> Vec<TaskStats> {
        self.stop().unwrap_or_default()
    }

    fn stop(&mut self) -> Option<Vec<TaskStats>> {
        self.shutdown.store(true, Ordering::Relaxed);
        let handle = self.join_handle.take()?;
        match handle.join() {
            Ok(stats) => {
                tracing::trace!("executor thread joined successfully");
                Some(stats)
            }
            Err(e) => {
                // Thread panicked; log but don't propagate
                tracing::warn!(?e, "executor thread panicked during shutdown");
                None
            }
        }
    }
}

impl Drop for TurretRuntime {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
