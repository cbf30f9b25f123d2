//! Fixed-point estimation and control core for small multirotors.
//!
//! Hardware stays behind a handful of traits ([`sensors::SensorDriver`],
//! [`receiver::Receiver`], [`control::MotorOutput`],
//! [`persist::SettingsStore`], [`status::BatteryMonitor`],
//! [`status::StatusLeds`]); everything else is deterministic integer math that
//! runs the same on the flight controller and on the host.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod calibration;
pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod flight;
pub mod imu;
pub mod math;
pub mod persist;
pub mod receiver;
pub mod ring_buffer;
pub mod sensors;
pub mod settings;
pub mod state;
pub mod status;
pub mod time;

pub use controller::{FlightController, LoopIo, StepOutcome};
pub use error::{CoreError, CoreResult, PersistError, SensorError};
pub use math::{FixedPoint, Vector3};
pub use settings::UserSettings;
