//! Cooperative fixed-period task executor.
//!
//! Tasks are boxed closures run on the executor's thread in registration
//! order whenever their deadline has passed. Each task owns the state it
//! writes; anything shared lives in atomics or channels.
//!
//! A task that falls a whole period behind is rescheduled from "now" and the
//! miss is counted as an overrun. Tasks always receive the actual current
//! time, so rate-dependent maths stays correct under jitter.
//!
//! With a `ManualClock` sleeping advances virtual time, so `run_until`
//! executes a simulated schedule as fast as the CPU allows.

use std::sync::Arc;
use std::time::{Duration, Instant};

use turret_traits::Clock;

use crate::error::Result;

pub type TaskFn = Box<dyn FnMut(Instant) -> Result<()> + Send>;

struct Task {
    name: &'static str,
    period: Duration,
    next_due: Instant,
    run: TaskFn,
    runs: u64,
    overruns: u64,
    failures: u64,
}

/// Counters for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    pub name: &'static str,
    pub period: Duration,
    pub runs: u64,
    pub overruns: u64,
    pub failures: u64,
}

pub struct Executor {
    clock: Arc<dyn Clock + Send + Sync>,
    tasks: Vec<Task>,
}

impl core::fmt::Debug for Executor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Executor")
            .field("tasks", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Executor {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            clock,
            tasks: Vec::new(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Register a task; it first runs on the next `run_pending`.
    pub fn add_task<F>(&mut self, name: &'static str, period: Duration, run: F) -> &mut Self
    where
        F: FnMut(Instant) -> Result<()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        tracing::debug!(
            task = name,
            period_ms = period.as_millis(),
            rate_hz = crate::util::rate_hz(period),
            "task registered"
        );
        self.tasks.push(Task {
            name,
            period,
            next_due: self.clock.now(),
            run: Box::new(run),
            runs: 0,
            overruns: 0,
            failures: 0,
        });
        self
    }

    /// Earliest deadline among all tasks.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.iter().map(|t| t.next_due).min()
    }

    /// Run every task whose deadline has passed; returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        for task in &mut self.tasks {
            let now = self.clock.now();
            if now < task.next_due {
                continue;
            }
            if let Err(e) = (task.run)(now) {
                task.failures += 1;
                tracing::warn!(task = task.name, error = %e, "task failed");
            }
            task.runs += 1;
            ran += 1;

            task.next_due += task.period;
            if task.next_due <= now {
                task.overruns += 1;
                let late = now.saturating_duration_since(task.next_due);
                tracing::debug!(
                    task = task.name,
                    late_ms = late.as_millis(),
                    overruns = task.overruns,
                    "task overrun; rescheduling from now"
                );
                task.next_due = now + task.period;
            }
        }
        ran
    }

    /// Run tasks, sleeping on the clock between deadlines, until `stop`
    /// returns true. `stop` is checked before every pass.
    pub fn run_until<F: FnMut() -> bool>(&mut self, mut stop: F) {
        while !stop() {
            self.run_pending();
            let Some(deadline) = self.next_deadline() else {
                break;
            };
            let now = self.clock.now();
            if deadline > now {
                self.clock.sleep(deadline - now);
            }
        }
    }

    /// Run for `d` of clock time.
    pub fn run_for(&mut self, d: Duration) {
        let end = self.clock.now() + d;
        let clock = self.clock.clone();
        self.run_until(move || clock.now() >= end);
    }

    pub fn stats(&self) -> Vec<TaskStats> {
        self.tasks
            .iter()
            .map(|t| TaskStats {
                name: t.name,
                period: t.period,
                runs: t.runs,
                overruns: t.overruns,
                failures: t.failures,
            })
            .collect()
    }
}
