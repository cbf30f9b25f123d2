//! Stick input to angle error.
//!
//! Level mode commands an attitude: the error is the stick angle minus the
//! estimated attitude. Rate mode commands a rotation rate: the error is the
//! accumulated difference between commanded and measured rate, which makes it
//! behave like an attitude error that the stick drags along.

use crate::config::{
    LEVEL_MAX_TILT, LEVEL_MAX_TILT_HIGH_ANGLE, MAX_RATE_MODE_ANGLE_ERROR, SEMI_ACRO_THRESHOLD,
};
use crate::flight::checkbox::CheckboxItems;
use crate::math::{abs, constrain, constrain180, multiply, shl, shr, Axis, FixedPoint, Vector3, ZERO};
use crate::receiver::{Channel, RxChannels};
use crate::time::Timesliver;

/// Rate limits for rate-mode flying, degrees per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub roll_and_pitch: FixedPoint,
    pub yaw: FixedPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PilotControl {
    /// Accumulated rate error per axis while in rate mode.
    accumulated: Vector3,
    desired_heading: FixedPoint,
}

impl PilotControl {
    pub const fn new() -> Self {
        Self { accumulated: Vector3::ZERO, desired_heading: ZERO }
    }

    /// Forgets accumulated rate errors and holds the current heading. Called
    /// on arming and while the throttle is on the stop.
    pub fn reset(&mut self, heading: FixedPoint) {
        self.accumulated = Vector3::ZERO;
        self.desired_heading = heading;
    }

    pub fn desired_heading(&self) -> FixedPoint {
        self.desired_heading
    }

    pub fn angle_error(
        &mut self,
        rx: &RxChannels,
        attitude: Vector3,
        gyro: Vector3,
        modes: CheckboxItems,
        rates: RateLimits,
        timesliver: Timesliver,
    ) -> Vector3 {
        let rate_shift = if modes.contains(CheckboxItems::HIGH_RATES) { 1 } else { 0 };
        let max_tilt = if modes.contains(CheckboxItems::HIGH_ANGLE) {
            LEVEL_MAX_TILT_HIGH_ANGLE
        } else {
            LEVEL_MAX_TILT
        };

        let mut error = Vector3::ZERO;
        for (axis, channel) in [(Axis::Roll, Channel::Roll), (Axis::Pitch, Channel::Pitch)] {
            let stick = rx.get(channel);
            let rate_mode = modes.contains(CheckboxItems::FULL_ACRO)
                || (modes.contains(CheckboxItems::SEMI_ACRO) && abs(stick) > SEMI_ACRO_THRESHOLD);

            error[axis] = if rate_mode {
                let max_rate = shl(rates.roll_and_pitch, rate_shift);
                self.accumulate(axis, stick, max_rate, gyro[axis], timesliver)
            } else {
                self.accumulated[axis] = ZERO;
                multiply(stick, max_tilt) - attitude[axis]
            };
        }

        let yaw_stick = rx.get(Channel::Yaw);
        let max_yaw_rate = shl(rates.yaw, rate_shift);
        error[Axis::Yaw] = if modes.contains(CheckboxItems::YAW_HOLD) {
            self.hold_heading(yaw_stick, max_yaw_rate, attitude[Axis::Yaw], timesliver)
        } else {
            self.accumulate(Axis::Yaw, yaw_stick, max_yaw_rate, gyro[Axis::Yaw], timesliver)
        };

        error
    }

    fn accumulate(
        &mut self,
        axis: Axis,
        stick: FixedPoint,
        max_rate: FixedPoint,
        measured_rate: FixedPoint,
        timesliver: Timesliver,
    ) -> FixedPoint {
        let rate_error = multiply(stick, max_rate) - measured_rate;
        let accumulated = &mut self.accumulated[axis];
        *accumulated += shr(multiply(rate_error, timesliver.raw()), Timesliver::EXTRA_SHIFT);
        constrain(accumulated, -MAX_RATE_MODE_ANGLE_ERROR, MAX_RATE_MODE_ANGLE_ERROR);
        *accumulated
    }

    fn hold_heading(
        &mut self,
        stick: FixedPoint,
        max_rate: FixedPoint,
        heading: FixedPoint,
        timesliver: Timesliver,
    ) -> FixedPoint {
        self.desired_heading += shr(multiply(multiply(stick, max_rate), timesliver.raw()), Timesliver::EXTRA_SHIFT);
        constrain180(&mut self.desired_heading);

        let mut error = self.desired_heading - heading;
        constrain180(&mut error);
        if abs(error) > MAX_RATE_MODE_ANGLE_ERROR {
            // Do not let the target run away from a yaw the aircraft cannot follow.
            constrain(&mut error, -MAX_RATE_MODE_ANGLE_ERROR, MAX_RATE_MODE_ANGLE_ERROR);
            self.desired_heading = heading + error;
            constrain180(&mut self.desired_heading);
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{fp, fp_ratio};
    use crate::receiver::RxFrame;

    const RATES: RateLimits = RateLimits { roll_and_pitch: fp(400), yaw: fp(400) };

    fn sticks(roll: FixedPoint, pitch: FixedPoint, yaw: FixedPoint) -> RxChannels {
        let mut frame = RxFrame::default();
        frame.set(Channel::Roll, roll);
        frame.set(Channel::Pitch, pitch);
        frame.set(Channel::Yaw, yaw);
        let mut rx = RxChannels::default();
        rx.set_all(&frame);
        rx
    }

    #[test]
    fn level_mode_commands_an_angle() {
        let mut pilot = PilotControl::new();
        let rx = sticks(fp_ratio(1, 2), fp(-1), ZERO);
        let attitude = Vector3::new(fp(10), fp(-5), ZERO);
        let error =
            pilot.angle_error(&rx, attitude, Vector3::ZERO, CheckboxItems::empty(), RATES, Timesliver::MAX);
        assert_eq!(error.roll(), multiply(fp_ratio(1, 2), LEVEL_MAX_TILT) - fp(10));
        assert_eq!(error.pitch(), -LEVEL_MAX_TILT + fp(5));

        let error =
            pilot.angle_error(&rx, attitude, Vector3::ZERO, CheckboxItems::HIGH_ANGLE, RATES, Timesliver::MAX);
        assert_eq!(error.pitch(), -LEVEL_MAX_TILT_HIGH_ANGLE + fp(5));
    }

    #[test]
    fn acro_accumulates_rate_error_and_clamps() {
        let mut pilot = PilotControl::new();
        let rx = sticks(fp_ratio(1, 4), ZERO, ZERO);
        let ts = Timesliver::from_micros(2_000);
        let mut error = Vector3::ZERO;
        for _ in 0..10 {
            error = pilot.angle_error(&rx, Vector3::ZERO, Vector3::ZERO, CheckboxItems::FULL_ACRO, RATES, ts);
        }
        // 100 deg/s for ~20 ms.
        assert!(error.roll() > fp_ratio(19, 10) && error.roll() < fp_ratio(21, 10));

        // Spinning at the commanded rate holds the error steady.
        let held = pilot.angle_error(
            &rx,
            Vector3::ZERO,
            Vector3::new(fp(100), ZERO, ZERO),
            CheckboxItems::FULL_ACRO,
            RATES,
            ts,
        );
        assert_eq!(held.roll(), error.roll());

        for _ in 0..1_000 {
            error = pilot.angle_error(&rx, Vector3::ZERO, Vector3::ZERO, CheckboxItems::FULL_ACRO, RATES, ts);
        }
        assert_eq!(error.roll(), MAX_RATE_MODE_ANGLE_ERROR);
    }

    #[test]
    fn semi_acro_switches_on_large_deflection_only() {
        let mut pilot = PilotControl::new();
        let ts = Timesliver::from_micros(2_000);
        let gentle = sticks(fp_ratio(2, 5), ZERO, ZERO);
        let error = pilot.angle_error(&gentle, Vector3::ZERO, Vector3::ZERO, CheckboxItems::SEMI_ACRO, RATES, ts);
        assert_eq!(error.roll(), multiply(fp_ratio(2, 5), LEVEL_MAX_TILT));

        let hard = sticks(fp_ratio(4, 5), ZERO, ZERO);
        let error = pilot.angle_error(&hard, Vector3::ZERO, Vector3::ZERO, CheckboxItems::SEMI_ACRO, RATES, ts);
        assert!(error.roll() > ZERO && error.roll() < fp(1));
    }

    #[test]
    fn high_rates_double_the_rate() {
        let ts = Timesliver::from_micros(2_000);
        let rx = sticks(fp_ratio(1, 4), ZERO, ZERO);
        let mut normal = PilotControl::new();
        let mut fast = PilotControl::new();
        let a = normal.angle_error(&rx, Vector3::ZERO, Vector3::ZERO, CheckboxItems::FULL_ACRO, RATES, ts);
        let b = fast.angle_error(
            &rx,
            Vector3::ZERO,
            Vector3::ZERO,
            CheckboxItems::FULL_ACRO | CheckboxItems::HIGH_RATES,
            RATES,
            ts,
        );
        assert!(b.roll() > a.roll() + a.roll() / 2);
    }

    #[test]
    fn heading_hold_tracks_the_desired_heading() {
        let mut pilot = PilotControl::new();
        pilot.reset(fp(170));
        let ts = Timesliver::from_micros(2_000);
        let centered = sticks(ZERO, ZERO, ZERO);
        let attitude = Vector3::new(ZERO, ZERO, fp(-175));
        let error = pilot.angle_error(&centered, attitude, Vector3::ZERO, CheckboxItems::YAW_HOLD, RATES, ts);
        // 170 is 15 degrees counterclockwise of -175, across the wrap.
        assert_eq!(error.yaw(), fp(-15));

        let far = Vector3::new(ZERO, ZERO, fp(90));
        let error = pilot.angle_error(&centered, far, Vector3::ZERO, CheckboxItems::YAW_HOLD, RATES, ts);
        assert_eq!(error.yaw(), MAX_RATE_MODE_ANGLE_ERROR);
        assert_eq!(pilot.desired_heading(), fp(135));
    }

    #[test]
    fn reset_clears_accumulators() {
        let mut pilot = PilotControl::new();
        let rx = sticks(ZERO, ZERO, fp(1));
        let ts = Timesliver::from_micros(2_000);
        let error = pilot.angle_error(&rx, Vector3::ZERO, Vector3::ZERO, CheckboxItems::empty(), RATES, ts);
        assert!(error.yaw() > ZERO);
        pilot.reset(fp(30));
        assert_eq!(pilot.desired_heading(), fp(30));
        let still = sticks(ZERO, ZERO, ZERO);
        let error = pilot.angle_error(&still, Vector3::ZERO, Vector3::ZERO, CheckboxItems::empty(), RATES, ts);
        assert_eq!(error.yaw(), ZERO);
    }
}
