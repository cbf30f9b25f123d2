//! Everything the control loop knows about the aircraft right now.
//!
//! One writer per field group: the sensor step fills `sensors`, the
//! estimators own their own state, the receiver step owns `rx` and the state
//! machine owns `modes`. A configurator or telemetry link reads it through
//! [`FlightController::state`](crate::controller::FlightController::state).

use crate::control::MOTOR_COUNT;
use crate::flight::FlightModes;
use crate::imu::{AltitudeEstimator, AttitudeEstimator};
use crate::math::{FixedPoint, Vector3, ZERO};
use crate::receiver::{RxChannels, RxFrame};
use crate::sensors::SensorFaults;
use crate::status::BatteryState;
use crate::time::Timesliver;

// ── Field groups ──────────────────────────────────────────────────────────────

/// Latest calibrated sensor values. Each keeps its previous value when a
/// read fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorReadings {
    /// Degrees per second, body frame.
    pub gyro_rate: Vector3,
    /// g, body frame.
    pub acceleration: Vector3,
    pub compass: Option<Vector3>,
    /// Barometric altitude in meters, once the barometer has delivered.
    pub barometer_altitude: Option<FixedPoint>,
    pub faults: SensorFaults,
}

/// What went to the motors on the last iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputState {
    /// Collective throttle, `[0, 1]`.
    pub throttle: FixedPoint,
    pub angle_error: Vector3,
    /// Roll, pitch and yaw corrections after gain scheduling.
    pub pid: Vector3,
    pub motor_pulses_us: [u16; MOTOR_COUNT],
}

impl Default for OutputState {
    fn default() -> Self {
        Self {
            throttle: ZERO,
            angle_error: Vector3::ZERO,
            pid: Vector3::ZERO,
            motor_pulses_us: [crate::config::MIN_MOTOR_PULSE_US; MOTOR_COUNT],
        }
    }
}

// ── Global state ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalState {
    pub sensors: SensorReadings,
    pub attitude: AttitudeEstimator,
    pub altitude: AltitudeEstimator,
    /// Last decoded frame; `rx` is smoothed toward it every iteration.
    pub last_frame: RxFrame,
    pub rx: RxChannels,
    pub modes: FlightModes,
    pub outputs: OutputState,
    pub battery: BatteryState,
    pub timesliver: Timesliver,
    /// Whether the settings in use came from the store.
    pub settings_from_store: bool,
}

impl GlobalState {
    pub fn new(now: u32, settings_from_store: bool) -> Self {
        Self {
            sensors: SensorReadings::default(),
            attitude: AttitudeEstimator::new(),
            altitude: AltitudeEstimator::new(),
            last_frame: RxFrame::default(),
            rx: RxChannels::default(),
            modes: FlightModes::new(now),
            outputs: OutputState::default(),
            battery: BatteryState::new(),
            timesliver: Timesliver::default(),
            settings_from_store,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.modes.is_armed()
    }

    pub fn is_failsafe(&self) -> bool {
        self.modes.failsafe.is_active()
    }
}
