use std::time::Instant;

use crate::util::elapsed_s;

/// Single-pole filtered differentiator over encoder counts.
///
/// Feed it a continuous count: callers that rebase the hardware counter add
/// the accumulated rebase offset back before sampling.
#[derive(Debug, Clone)]
pub struct VelocityEstimator {
    persistence: f32,
    last: Option<(i64, Instant)>,
    filtered: f32,
}

impl VelocityEstimator {
    pub fn new(persistence: f32) -> Self {
        Self {
            persistence,
            last: None,
            filtered: 0.0,
        }
    }

    pub fn set_persistence(&mut self, persistence: f32) {
        self.persistence = persistence;
    }

    /// Latest filtered estimate in counts/s.
    pub fn velocity(&self) -> f32 {
        self.filtered
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.filtered = 0.0;
    }

    pub fn sample(&mut self, count: i64, now: Instant) -> f32 {
        let Some((prev_count, prev_at)) = self.last else {
            self.last = Some((count, now));
            return self.filtered;
        };
        let dt = elapsed_s(prev_at, now);
        if dt <= 0.0 {
            return self.filtered;
        }
        #[allow(clippy::cast_precision_loss)]
        let raw = count.saturating_sub(prev_count) as f32 / dt;
        let a = self.persistence;
        self.filtered = (1.0 - a) * raw + a * self.filtered;
        self.last = Some((count, now));
        self.filtered
    }
}
