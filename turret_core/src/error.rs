use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TurretError {
    #[error("not calibrated: {0}")]
    Calibration(String),
    #[error("invalid angle {0}: expected one of 0, 90, 180, 270")]
    InvalidAngle(u16),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing encoder")]
    MissingEncoder,
    #[error("missing motor")]
    MissingMotor,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
