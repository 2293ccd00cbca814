//! Common time/period helpers for turret_core.

use std::time::{Duration, Instant};

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Task period from a millisecond setting.
/// - Clamps to at least 1 ms so a task can never spin.
#[inline]
pub fn period_from_ms(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}

/// Whole ticks per second for a given period, at least 1.
#[inline]
pub fn rate_hz(period: Duration) -> u64 {
    let ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX).max(1);
    (MILLIS_PER_SEC / ms).max(1)
}

/// Seconds from `prev` to `now`; 0 when `now` is not after `prev`.
#[inline]
pub fn elapsed_s(prev: Instant, now: Instant) -> f32 {
    now.saturating_duration_since(prev).as_secs_f32()
}
