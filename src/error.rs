//! Error types for the collaborator boundaries.
//!
//! Nothing here ever reaches the control path: sensor faults are counted and
//! the last good sample is reused, and a settings load failure falls back to
//! the compiled defaults. Only the save path hands an error back to its caller.

use thiserror::Error;

/// Sensor read or setup failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    #[error("sensor bus transfer failed")]
    Bus,

    #[error("sensor answered with an unexpected identity")]
    WrongIdentity,

    #[error("no new sample available yet")]
    NotReady,
}

/// Settings store failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistError {
    #[error("settings store read failed")]
    ReadFailed,

    #[error("settings store write failed")]
    WriteFailed,

    #[error("settings store commit failed")]
    CommitFailed,

    #[error("settings record does not fit the store")]
    TooLarge,
}

/// Anything the startup and calibration paths can report.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoreError {
    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
}

pub type CoreResult<T> = Result<T, CoreError>;
