//! Whole-loop scenarios against scripted collaborators.

use core::cell::Cell;

use approx::assert_abs_diff_eq;

use quadcore::config::{FAILSAFE_THROTTLE, MIN_MOTOR_PULSE_US};
use quadcore::control::{MotorOutput, MOTOR_COUNT};
use quadcore::flight::{AuxSwitchMask, Checkbox};
use quadcore::math::{fp, fp_ratio, Axis, FixedPoint, Vector3, HALF, ONE, ZERO};
use quadcore::persist::{self, SettingsStore, MAGIC};
use quadcore::receiver::{Channel, Receiver, RxFrame};
use quadcore::sensors::SensorDriver;
use quadcore::time::{Clock, TickSource};
use quadcore::{FlightController, LoopIo, PersistError, SensorError};

const STEP_US: u64 = 2_000;

// ── Fakes ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Ticks {
    micros: Cell<u64>,
    /// Added after every sub-millisecond read, so busy-waits terminate.
    drift: Cell<u64>,
}

impl TickSource for Ticks {
    fn millis(&self) -> u32 {
        (self.micros.get() / 1000) as u32
    }

    fn sub_millis_micros(&self) -> u32 {
        let sub = (self.micros.get() % 1000) as u32;
        self.micros.set(self.micros.get() + self.drift.get());
        sub
    }
}

struct Fixed<R: Copy> {
    value: R,
}

impl<R: Copy> SensorDriver for Fixed<R> {
    type Reading = R;

    fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read(&mut self) -> Result<R, SensorError> {
        Ok(self.value)
    }
}

struct Radio {
    frame: RxFrame,
    silent: bool,
}

impl Receiver for Radio {
    fn poll(&mut self) -> Option<RxFrame> {
        (!self.silent).then_some(self.frame)
    }
}

#[derive(Default)]
struct Motors {
    pulses: [u16; MOTOR_COUNT],
}

impl MotorOutput for Motors {
    fn set_motor(&mut self, index: usize, pulse_us: u16) {
        self.pulses[index] = pulse_us;
    }
}

struct Flash {
    bytes: [u8; 512],
}

impl SettingsStore for Flash {
    fn read_block(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), PersistError> {
        let source = self.bytes.get(offset..offset + buffer.len()).ok_or(PersistError::ReadFailed)?;
        buffer.copy_from_slice(source);
        Ok(())
    }

    fn write_block(&mut self, offset: usize, data: &[u8]) -> Result<(), PersistError> {
        let target = self.bytes.get_mut(offset..offset + data.len()).ok_or(PersistError::WriteFailed)?;
        target.copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PersistError> {
        Ok(())
    }
}

struct Rig {
    gyro: Fixed<Vector3>,
    accelerometer: Fixed<Vector3>,
    barometer: Option<Fixed<FixedPoint>>,
    radio: Radio,
    motors: Motors,
}

impl Rig {
    fn level() -> Self {
        Self {
            gyro: Fixed { value: Vector3::ZERO },
            accelerometer: Fixed { value: Vector3::new(ZERO, ZERO, ONE) },
            barometer: None,
            radio: Radio { frame: sticks(fp(-1), ZERO, false), silent: false },
            motors: Motors::default(),
        }
    }

    fn io(&mut self) -> LoopIo<'_> {
        LoopIo {
            gyro: &mut self.gyro,
            accelerometer: &mut self.accelerometer,
            barometer: self.barometer.as_mut().map(|b| b as &mut dyn SensorDriver<Reading = FixedPoint>),
            compass: None,
            gps: None,
            receiver: &mut self.radio,
            motors: &mut self.motors,
            battery: None,
            leds: None,
        }
    }
}

/// Throttle and roll sticks plus the arm switch on aux 2.
fn sticks(throttle: FixedPoint, roll: FixedPoint, arm: bool) -> RxFrame {
    let mut frame = RxFrame::default();
    frame.set(Channel::Throttle, throttle);
    frame.set(Channel::Roll, roll);
    frame.set(Channel::Aux2, if arm { ONE } else { -ONE });
    frame
}

/// Same sticks with aux 3 up, where the altitude modes are switched.
fn with_aux3_high(mut frame: RxFrame) -> RxFrame {
    frame.set(Channel::Aux3, ONE);
    frame
}

fn blank_flash() -> Flash {
    Flash { bytes: [0xFF; 512] }
}

fn fly(controller: &mut FlightController<&Ticks>, ticks: &Ticks, rig: &mut Rig, steps: u32) -> bool {
    let mut calibration_requested = false;
    for _ in 0..steps {
        ticks.micros.set(ticks.micros.get() + STEP_US);
        calibration_requested |= controller.step(&mut rig.io()).calibration_requested;
    }
    calibration_requested
}

fn started<'t>(ticks: &'t Ticks, rig: &mut Rig) -> FlightController<&'t Ticks> {
    let loaded = persist::load(&mut blank_flash());
    let mut controller = FlightController::new(Clock::new(ticks), loaded);
    controller.initialize(&mut rig.io()).unwrap();
    controller
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn arming_is_refused_until_throttle_is_low() {
    let ticks = Ticks::default();
    let mut rig = Rig::level();
    let mut controller = started(&ticks, &mut rig);

    rig.radio.frame = sticks(ZERO, ZERO, true);
    fly(&mut controller, &ticks, &mut rig, 300);
    assert!(!controller.state().is_armed());
    assert_eq!(rig.motors.pulses, [MIN_MOTOR_PULSE_US; MOTOR_COUNT]);

    rig.radio.frame = sticks(fp(-1), ZERO, true);
    fly(&mut controller, &ticks, &mut rig, 300);
    let state = controller.state();
    assert!(state.is_armed());
    assert_abs_diff_eq!(
        state.modes.arming.heading_when_armed().to_num::<f64>(),
        state.attitude.heading().to_num::<f64>(),
        epsilon = 0.5
    );
    assert_eq!(state.modes.arming.altitude_when_armed(), state.altitude.altitude());
    // Armed at idle: motors at the armed minimum, not stopped.
    let armed_min = controller.settings().output.armed_min_pulse_us;
    assert!(rig.motors.pulses.iter().all(|&p| p == armed_min));
}

#[test]
fn losing_the_link_descends_level() {
    let ticks = Ticks::default();
    let mut rig = Rig::level();
    let mut controller = started(&ticks, &mut rig);

    rig.radio.frame = sticks(fp(-1), ZERO, true);
    fly(&mut controller, &ticks, &mut rig, 100);
    rig.radio.frame = sticks(fp_ratio(1, 2), fp_ratio(1, 2), true);
    fly(&mut controller, &ticks, &mut rig, 100);
    assert!(controller.state().is_armed());
    assert!(!controller.state().is_failsafe());

    rig.radio.silent = true;
    fly(&mut controller, &ticks, &mut rig, 400);
    assert!(!controller.state().is_failsafe());
    fly(&mut controller, &ticks, &mut rig, 200);

    let state = controller.state();
    assert!(state.is_failsafe());
    assert_eq!(state.outputs.throttle, FAILSAFE_THROTTLE);
    let attitude = state.attitude.euler();
    assert_eq!(state.outputs.angle_error[Axis::Roll], -attitude[Axis::Roll]);
    assert_eq!(state.outputs.angle_error[Axis::Pitch], -attitude[Axis::Pitch]);

    rig.radio.silent = false;
    fly(&mut controller, &ticks, &mut rig, 1);
    assert!(!controller.state().is_failsafe());
}

#[test]
fn roll_stick_speeds_up_the_left_motors() {
    let ticks = Ticks::default();
    let mut rig = Rig::level();
    let mut controller = started(&ticks, &mut rig);

    rig.radio.frame = sticks(fp(-1), ZERO, true);
    fly(&mut controller, &ticks, &mut rig, 100);
    rig.radio.frame = sticks(ZERO, ZERO, true);
    fly(&mut controller, &ticks, &mut rig, 100);
    let [fr, rr, fl, rl] = rig.motors.pulses;
    assert_eq!([fr, rr, fl], [rl; 3]);

    rig.radio.frame = sticks(ZERO, fp_ratio(1, 2), true);
    fly(&mut controller, &ticks, &mut rig, 50);
    let [fr, rr, fl, rl] = rig.motors.pulses;
    assert!(fl > fr && rl > rr);
}

#[test]
fn foreign_store_contents_mean_defaults() {
    let ticks = Ticks::default();
    let mut flash = blank_flash();
    flash.bytes[..4].copy_from_slice(&[0x12, 0x34, 0x10, 0x00]);
    let loaded = persist::load(&mut flash);
    let controller = FlightController::new(Clock::new(&ticks), loaded);
    assert!(!controller.state().settings_from_store);
    assert_eq!(*controller.settings(), quadcore::UserSettings::default());
}

#[test]
fn stick_gesture_calibrates_and_saves() {
    let ticks = Ticks::default();
    let mut rig = Rig::level();
    let bias = Vector3::new(fp_ratio(3, 2), fp(-1), fp_ratio(1, 4));
    rig.gyro.value = bias;
    let mut controller = started(&ticks, &mut rig);

    let mut requested = false;
    for roll in [-ONE, ONE, -ONE, ONE, -ONE, ONE, ZERO] {
        rig.radio.frame = sticks(fp(-1), roll, false);
        requested |= fly(&mut controller, &ticks, &mut rig, 50);
    }
    assert!(requested);

    let mut flash = blank_flash();
    ticks.drift.set(100);
    controller.calibrate_and_save(&mut rig.io(), &mut flash).unwrap();
    ticks.drift.set(0);

    assert_eq!(controller.settings().gyro_calibration, bias);
    assert_eq!(&flash.bytes[..2], &MAGIC.to_le_bytes());
    let reloaded = persist::load(&mut flash);
    assert!(reloaded.from_persistent_store);
    assert_eq!(reloaded.settings.gyro_calibration, bias);

    // Calibrated gyro now reads zero.
    fly(&mut controller, &ticks, &mut rig, 1);
    assert_eq!(controller.state().sensors.gyro_rate, Vector3::ZERO);
}

/// Long enough for the altitude estimate to settle on a new barometer value.
const SETTLE_STEPS: u32 = 5_000;

fn set_barometer(rig: &mut Rig, meters: i32) {
    rig.barometer = Some(Fixed { value: fp(meters) });
}

#[test]
fn altitude_hold_pulls_back_to_the_captured_altitude() {
    let ticks = Ticks::default();
    let mut rig = Rig::level();
    set_barometer(&mut rig, 10);
    let mut controller = started(&ticks, &mut rig);
    controller.settings_mut().checkboxes.set(Checkbox::AltitudeHold, AuxSwitchMask::AUX3_HIGH);

    rig.radio.frame = sticks(fp(-1), ZERO, true);
    fly(&mut controller, &ticks, &mut rig, 100);
    rig.radio.frame = sticks(ZERO, ZERO, true);
    fly(&mut controller, &ticks, &mut rig, SETTLE_STEPS);
    assert!(controller.state().is_armed());

    rig.radio.frame = with_aux3_high(sticks(ZERO, ZERO, true));
    fly(&mut controller, &ticks, &mut rig, 50);
    let target = controller.state().modes.altitude_hold.target();
    assert_abs_diff_eq!(target.to_num::<f64>(), 10.0, epsilon = 0.2);

    // Sinking: the hold adds throttle and keeps the original target.
    set_barometer(&mut rig, 8);
    fly(&mut controller, &ticks, &mut rig, SETTLE_STEPS);
    let state = controller.state();
    assert_eq!(state.modes.altitude_hold.target(), target);
    assert!(state.outputs.throttle > HALF + fp_ratio(1, 20), "{}", state.outputs.throttle);

    // Climbing past it: the hold takes throttle away.
    set_barometer(&mut rig, 12);
    fly(&mut controller, &ticks, &mut rig, SETTLE_STEPS);
    let state = controller.state();
    assert_eq!(state.modes.altitude_hold.target(), target);
    assert!(state.outputs.throttle < HALF - fp_ratio(1, 20), "{}", state.outputs.throttle);

    // Switch off: plain stick throttle again.
    rig.radio.frame = sticks(ZERO, ZERO, true);
    fly(&mut controller, &ticks, &mut rig, 50);
    assert_abs_diff_eq!(controller.state().outputs.throttle.to_num::<f64>(), 0.5, epsilon = 0.01);
}

#[test]
fn uncrashable_ceiling_overrides_full_throttle() {
    let ticks = Ticks::default();
    let mut rig = Rig::level();
    set_barometer(&mut rig, 0);
    let mut controller = started(&ticks, &mut rig);
    controller.settings_mut().checkboxes.set(Checkbox::Uncrashable, AuxSwitchMask::AUX3_HIGH);

    rig.radio.frame = sticks(fp(-1), ZERO, true);
    fly(&mut controller, &ticks, &mut rig, 100);
    rig.radio.frame = with_aux3_high(sticks(ONE, ZERO, true));
    fly(&mut controller, &ticks, &mut rig, 100);
    let ceiling = controller.state().modes.uncrashable.ceiling();
    assert_abs_diff_eq!(ceiling.to_num::<f64>(), 30.0, epsilon = 0.2);
    assert!(controller.state().outputs.throttle > fp_ratio(95, 100));

    set_barometer(&mut rig, 40);
    fly(&mut controller, &ticks, &mut rig, SETTLE_STEPS);
    let state = controller.state();
    assert_eq!(state.modes.altitude_hold.target(), ceiling);
    assert!(state.outputs.throttle < fp_ratio(6, 10), "{}", state.outputs.throttle);
}
