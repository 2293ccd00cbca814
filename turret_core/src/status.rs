//! Motion status returned from each control tick.

/// Public status of a single control tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionStatus {
    /// Nothing to do.
    Idle,
    /// Move in progress.
    Moving,
    /// Target reached on this tick; motor already commanded to zero.
    Arrived { position: i64 },
}
