//! The control loop: one call to [`FlightController::step`] per iteration.
//!
//! Order within an iteration:
//! checkboxes, timesliver, sensors and estimator, arming, stick command,
//! navigation mode, receiver, pilot angle error, navigation, ground idle,
//! altitude hold and uncrashable, tilt compensation, failsafe, PID with gain
//! scheduling, motors, battery and LEDs.

use crate::calibration::{calibrate_gyro_and_accelerometer, Calibration};
use crate::config::{AUTOTHROTTLE_DEAD_AREA, AUTOTHROTTLE_MIN_DOWN_Z, STICK_LOW};
use crate::control::{
    gain_schedule_multiplier, write_motors, AxisPid, MotorOutput, PidAxis, PilotControl,
};
use crate::error::{CoreResult, PersistError, SensorError};
use crate::flight::{ArmingEvent, CheckboxItems, NavigationMode};
use crate::math::{constrain, inv_sqrt, multiply, shr, Axis, FixedPoint, Vector3, HALF, ONE, ZERO};
use crate::persist::{self, LoadedSettings, SettingsStore};
use crate::receiver::{Channel, Receiver};
use crate::sensors::{poll_sensor, GpsFix, SensorDriver};
use crate::settings::UserSettings;
use crate::state::GlobalState;
use crate::status::{led_pattern, BatteryMonitor, StatusLeds};
use crate::time::{Clock, TickSource, Timer, Timesliver};

/// The collaborators one iteration talks to. Gyro, accelerometer, receiver
/// and motors are required; the rest are fitted on some boards only.
pub struct LoopIo<'a> {
    pub gyro: &'a mut dyn SensorDriver<Reading = Vector3>,
    pub accelerometer: &'a mut dyn SensorDriver<Reading = Vector3>,
    pub barometer: Option<&'a mut dyn SensorDriver<Reading = FixedPoint>>,
    pub compass: Option<&'a mut dyn SensorDriver<Reading = Vector3>>,
    pub gps: Option<&'a mut dyn SensorDriver<Reading = GpsFix>>,
    pub receiver: &'a mut dyn Receiver,
    pub motors: &'a mut dyn MotorOutput,
    pub battery: Option<&'a mut dyn BatteryMonitor>,
    pub leds: Option<&'a mut dyn StatusLeds>,
}

/// Requests an iteration leaves for the caller, which owns the blocking
/// resources (settings store, time for calibration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepOutcome {
    /// The stick gesture asked for a calibration and a settings save.
    pub calibration_requested: bool,
}

pub struct FlightController<T: TickSource> {
    clock: Clock<T>,
    loop_timer: Timer,
    settings: UserSettings,
    state: GlobalState,
    pilot: PilotControl,
    attitude_pids: [AxisPid; 3],
}

impl<T: TickSource> FlightController<T> {
    pub fn new(clock: Clock<T>, loaded: LoadedSettings) -> Self {
        let now = clock.now_micros();
        Self {
            loop_timer: Timer::at(now),
            state: GlobalState::new(now, loaded.from_persistent_store),
            settings: loaded.settings,
            clock,
            pilot: PilotControl::new(),
            attitude_pids: [AxisPid::attitude(); 3],
        }
    }

    pub fn state(&self) -> &GlobalState {
        &self.state
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    /// For a configurator link. Changes take effect on the next iteration.
    pub fn settings_mut(&mut self) -> &mut UserSettings {
        &mut self.settings
    }

    pub fn clock(&self) -> &Clock<T> {
        &self.clock
    }

    /// Brings the sensors up and seeds the attitude from the accelerometer.
    ///
    /// Gyro and accelerometer must come up; an optional sensor that fails is
    /// logged and counted, and the loop runs without it.
    pub fn initialize(&mut self, io: &mut LoopIo<'_>) -> Result<(), SensorError> {
        io.gyro.init()?;
        io.accelerometer.init()?;

        let faults = &mut self.state.sensors.faults;
        if let Some(barometer) = io.barometer.as_deref_mut() {
            if let Err(e) = barometer.init() {
                warn!("barometer init failed: {}", e);
                faults.barometer += 1;
            }
        }
        if let Some(compass) = io.compass.as_deref_mut() {
            if let Err(e) = compass.init() {
                warn!("compass init failed: {}", e);
                faults.compass += 1;
            }
        }
        if let Some(gps) = io.gps.as_deref_mut() {
            if let Err(e) = gps.init() {
                warn!("gps init failed: {}", e);
                faults.gps += 1;
            }
        }

        if let Some(raw) = poll_sensor(&mut *io.accelerometer, &mut faults.accelerometer) {
            self.state.sensors.acceleration = raw - self.settings.acc_calibration;
            self.state.attitude.align(self.state.sensors.acceleration);
        }

        let now = self.clock.now_micros();
        self.loop_timer = Timer::at(now);
        self.state.modes.failsafe.frame_received(now);
        self.pilot.reset(self.state.attitude.heading());
        info!("flight controller ready, settings from store: {=bool}", self.state.settings_from_store);
        Ok(())
    }

    /// Runs one iteration. Never blocks.
    pub fn step(&mut self, io: &mut LoopIo<'_>) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        let now = self.clock.now_micros();

        let items = self.state.modes.refresh_items(&self.settings.checkboxes, &self.state.rx);
        let timesliver = self.clock.timesliver(&mut self.loop_timer);
        self.state.timesliver = timesliver;

        let new_gps_reading = self.read_sensors(io);
        self.estimate(timesliver);

        let attitude = self.state.attitude.euler();
        let heading = self.state.attitude.heading();
        let altitude = self.state.altitude.altitude();
        let velocity = self.state.altitude.velocity();

        // ── Modes driven by the previous iteration's sticks ──────────────────
        let modes = &mut self.state.modes;
        let arm_event = modes.arming.update(
            items.contains(CheckboxItems::ARM),
            self.state.rx.throttle(),
            heading,
            altitude,
        );
        if arm_event == Some(ArmingEvent::Armed) {
            modes.navigator.set_home_to_current();
            self.pilot.reset(heading);
        }

        if !modes.arming.is_armed() {
            outcome.calibration_requested =
                modes.stick_command.update(self.state.rx.throttle(), self.state.rx.get(Channel::Roll), now);
        }

        if modes.navigator.update_mode(items) {
            self.pilot.reset(heading);
        }

        // ── Pilot input ──────────────────────────────────────────────────────
        if let Some(frame) = io.receiver.poll() {
            self.state.last_frame = frame;
            modes.failsafe.frame_received(now);
        }
        self.state.rx.smooth_toward(&self.state.last_frame, timesliver);
        let rx = &self.state.rx;

        let gyro = self.state.sensors.gyro_rate;
        let mut angle_error =
            self.pilot.angle_error(rx, attitude, gyro, items, self.settings.rates, timesliver);

        let navigation_gains = *self.settings.gains(PidAxis::Navigation);
        if modes.navigator.mode() != NavigationMode::Off {
            modes.navigator.steer(new_gps_reading, timesliver, heading, attitude, &navigation_gains, &mut angle_error);
        }

        if rx.throttle() < STICK_LOW || !modes.arming.is_armed() {
            self.pilot.reset(heading);
            for pid in self.attitude_pids.iter_mut() {
                pid.bleed(timesliver);
            }
        }

        // ── Throttle ─────────────────────────────────────────────────────────
        let mut throttle = shr(rx.throttle(), 1) + HALF;

        let mut hold_altitude =
            modes.altitude_hold.update_switch(items.contains(CheckboxItems::ALT_HOLD), altitude);

        if modes.uncrashable.update_switch(
            items.contains(CheckboxItems::UNCRASHABLE),
            altitude,
            &mut modes.navigator,
        ) {
            let guard = modes.uncrashable.guard_altitude(
                altitude,
                velocity,
                self.state.attitude.down().z,
                attitude,
                &mut modes.altitude_hold,
                &mut throttle,
                &mut angle_error,
            );
            hold_altitude |= guard.holds_altitude();
            modes.uncrashable.guard_position(
                &mut modes.navigator,
                new_gps_reading,
                timesliver,
                heading,
                attitude,
                &navigation_gains,
                &mut angle_error,
            );
        }

        if hold_altitude && self.state.sensors.barometer_altitude.is_some() {
            throttle += modes.altitude_hold.throttle_correction(
                altitude,
                velocity,
                timesliver,
                self.settings.gains(PidAxis::Altitude),
            );
        }

        if items.contains(CheckboxItems::AUTO_THROTTLE) || hold_altitude {
            throttle = compensate_tilt(throttle, self.state.attitude.down().z);
        }

        modes.failsafe.update(now);
        modes.failsafe.override_controls(&mut throttle, &mut angle_error, attitude);

        // ── Attitude PID and outputs ─────────────────────────────────────────
        let multiplier = gain_schedule_multiplier(throttle, self.settings.gain_scheduling_factor);
        let mut pid = Vector3::ZERO;
        for (axis, gains) in [
            (Axis::Roll, PidAxis::Roll),
            (Axis::Pitch, PidAxis::Pitch),
            (Axis::Yaw, PidAxis::Yaw),
        ] {
            let output = self.attitude_pids[axis as usize].update(
                angle_error[axis],
                gyro[axis],
                timesliver,
                self.settings.gains(gains),
            );
            pid[axis] = multiply(multiplier, output);
        }

        constrain(&mut throttle, ZERO, ONE);
        let armed = modes.arming.is_armed();
        let pulses = write_motors(&mut *io.motors, armed, throttle, pid, &self.settings.output);

        let outputs = &mut self.state.outputs;
        outputs.throttle = throttle;
        outputs.angle_error = angle_error;
        outputs.pid = pid;
        outputs.motor_pulses_us = pulses;

        self.update_status(io, now, timesliver);
        outcome
    }

    /// Measures new gyro and accelerometer offsets. Blocks; the aircraft
    /// must be still and level.
    pub fn calibrate(&mut self, io: &mut LoopIo<'_>) -> Result<Calibration, SensorError> {
        let calibration =
            calibrate_gyro_and_accelerometer(&self.clock, &mut *io.gyro, &mut *io.accelerometer)?;
        self.settings.gyro_calibration = calibration.gyro;
        self.settings.acc_calibration = calibration.accelerometer;
        // Time spent calibrating is not flight time.
        self.loop_timer = self.clock.start_timer();
        Ok(calibration)
    }

    pub fn save_settings(&self, store: &mut dyn SettingsStore) -> Result<(), PersistError> {
        persist::save(store, &self.settings)
    }

    /// What the stick command asks for: calibrate, then persist.
    pub fn calibrate_and_save(&mut self, io: &mut LoopIo<'_>, store: &mut dyn SettingsStore) -> CoreResult<()> {
        self.calibrate(io)?;
        self.save_settings(store)?;
        Ok(())
    }

    /// Returns whether the GPS delivered a usable fix this iteration.
    fn read_sensors(&mut self, io: &mut LoopIo<'_>) -> bool {
        let sensors = &mut self.state.sensors;
        let settings = &self.settings;

        if let Some(raw) = poll_sensor(&mut *io.gyro, &mut sensors.faults.gyro) {
            sensors.gyro_rate = raw - settings.gyro_calibration;
        }
        if let Some(raw) = poll_sensor(&mut *io.accelerometer, &mut sensors.faults.accelerometer) {
            sensors.acceleration = raw - settings.acc_calibration;
        }
        if let Some(barometer) = io.barometer.as_deref_mut() {
            if let Some(altitude) = poll_sensor(barometer, &mut sensors.faults.barometer) {
                sensors.barometer_altitude = Some(altitude);
            }
        }
        if let Some(compass) = io.compass.as_deref_mut() {
            if let Some(raw) = poll_sensor(compass, &mut sensors.faults.compass) {
                sensors.compass = Some(settings.calibrate_compass(raw));
            }
        }

        let Some(gps) = io.gps.as_deref_mut() else {
            return false;
        };
        match poll_sensor(gps, &mut sensors.faults.gps) {
            Some(fix) => self.state.modes.navigator.gps_reading(&fix),
            None => false,
        }
    }

    fn estimate(&mut self, timesliver: Timesliver) {
        let sensors = &self.state.sensors;
        self.state.attitude.update(sensors.gyro_rate, sensors.acceleration, sensors.compass, timesliver);
        self.state.altitude.update(
            sensors.acceleration,
            self.state.attitude.down(),
            sensors.barometer_altitude,
            timesliver,
        );
    }

    fn update_status(&mut self, io: &mut LoopIo<'_>, now: u32, timesliver: Timesliver) {
        if let Some(monitor) = io.battery.as_deref_mut() {
            if let Some(volts) = monitor.poll_voltage() {
                self.state.battery.update(volts, timesliver, self.settings.battery_undervoltage_limit);
            }
        }
        if let Some(leds) = io.leds.as_deref_mut() {
            leds.set_leds(led_pattern(
                now,
                self.state.battery.is_low(),
                self.state.is_failsafe(),
                self.state.is_armed(),
            ));
        }
    }
}

/// Scales the throttle by `1 / down_z` around the dead area so vertical
/// thrust stays the same when tilted. Left alone beyond the tilt where that
/// would blow up.
pub fn compensate_tilt(throttle: FixedPoint, down_z: FixedPoint) -> FixedPoint {
    if down_z <= AUTOTHROTTLE_MIN_DOWN_Z {
        return throttle;
    }
    let root = inv_sqrt(down_z);
    let reciprocal = multiply(root, root);
    multiply(throttle - AUTOTHROTTLE_DEAD_AREA, reciprocal) + AUTOTHROTTLE_DEAD_AREA
}
