#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core motion control (hardware-agnostic).
//!
//! This crate provides the hardware-independent turret engine. All hardware
//! interactions go through the `turret_traits::Encoder`,
//! `turret_traits::MotorDriver` and `turret_traits::Indicator` traits.
//!
//! ## Architecture
//!
//! - **Position model**: circular arithmetic over the raw count (`position`)
//! - **Profile**: trapezoidal velocity setpoints (`profile`)
//! - **Velocity loop**: filtered estimator plus PID (`velocity`, `pid`)
//! - **Motion controller**: IDLE/MOVING state machine (`controller`)
//! - **Auto-rotation**: quarter-turn cycling while idle (`auto_rotation`)
//! - **Scheduling**: fixed-period cooperative executor (`executor`, `runtime`)
//!
//! ## Concurrency
//!
//! Every task owns the state it writes. Commands reach the control task over
//! a channel via `MotionHandle`; everything readable from outside is published
//! through atomics in `MotionShared`.

pub mod atomic;
pub mod auto_rotation;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod executor;
pub mod handle;
pub mod hw_error;
pub mod mocks;
pub mod pid;
pub mod position;
pub mod profile;
pub mod runtime;
pub mod shared;
pub mod status;
mod tasks;
pub mod util;
pub mod velocity;

pub use auto_rotation::AutoRotation;
pub use builder::{Missing, Set, Turret, TurretBuilder};
pub use calibration::Calibration;
pub use config::{RotationSchedule, SchedulerCfg, TuningParams, UnwrapStrategy};
pub use controller::{MotionController, MotionState};
pub use error::{BuildError, Result, TurretError};
pub use executor::{Executor, TaskStats};
pub use handle::{Command, MotionHandle};
pub use pid::{PidGains, PidOutput, PidState, VelocityPid};
pub use position::{PositionModel, next_quarter, snap_to_quarter};
pub use runtime::TurretRuntime;
pub use shared::{MotionInfo, MotionShared};
pub use status::MotionStatus;
pub use velocity::VelocityEstimator;
