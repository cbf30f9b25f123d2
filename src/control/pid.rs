use crate::config::{INTEGRAL_BLEED_ONE_OVER_PERIOD, INTEGRATED_ERROR_LIMIT};
use crate::math::{constrain, low_pass_filter, multiply, shr, FixedPoint, HALF, ONE, ZERO};
use crate::time::Timesliver;

/// Loops that carry their own gain set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PidAxis {
    Roll = 0,
    Pitch = 1,
    Yaw = 2,
    Altitude = 3,
    Navigation = 4,
}

impl PidAxis {
    pub const COUNT: usize = 5;
    pub const ALL: [PidAxis; Self::COUNT] =
        [PidAxis::Roll, PidAxis::Pitch, PidAxis::Yaw, PidAxis::Altitude, PidAxis::Navigation];
}

/// Proportional, integral and derivative gains for one control axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PidGains {
    pub p: FixedPoint,
    pub i: FixedPoint,
    pub d: FixedPoint,
}

impl PidGains {
    pub const fn new(p: FixedPoint, i: FixedPoint, d: FixedPoint) -> Self {
        Self { p, i, d }
    }

    /// Gains written as raw fixed-point bits, the way the tuning tables are kept.
    pub const fn from_bits(p: i32, i: i32, d: i32) -> Self {
        Self::new(FixedPoint::from_bits(p), FixedPoint::from_bits(i), FixedPoint::from_bits(d))
    }
}

/// Integrator state of one PID axis.
///
/// The integrated error accumulates `error * timesliver` with the
/// timesliver's extra precision bits, and is clamped to the windup limit on
/// every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisPid {
    integrated_error: FixedPoint,
    windup_limit: FixedPoint,
    /// Extra right shift applied to the integral term.
    integral_shift: u32,
}

impl AxisPid {
    pub const fn new(windup_limit: FixedPoint, integral_shift: u32) -> Self {
        Self { integrated_error: ZERO, windup_limit, integral_shift }
    }

    /// Roll, pitch and yaw: the integral term is scaled down by 16.
    pub const fn attitude() -> Self {
        Self::new(INTEGRATED_ERROR_LIMIT, crate::config::ATTITUDE_INTEGRAL_SHIFT)
    }

    pub const fn altitude() -> Self {
        Self::new(INTEGRATED_ERROR_LIMIT, 0)
    }

    /// One per earth axis, north and east; the error is in meters.
    pub const fn navigation() -> Self {
        Self::new(INTEGRATED_ERROR_LIMIT, 0)
    }

    /// `error * P - rate * D + (integrated_error * I) >> shift`.
    ///
    /// The derivative acts on the measured rate, not on the differenced
    /// error, so setpoint steps do not kick the output.
    pub fn update(
        &mut self,
        error: FixedPoint,
        rate: FixedPoint,
        timesliver: Timesliver,
        gains: &PidGains,
    ) -> FixedPoint {
        self.integrated_error += multiply(error, timesliver.raw());
        constrain(&mut self.integrated_error, -self.windup_limit, self.windup_limit);

        multiply(error, gains.p) - multiply(rate, gains.d)
            + shr(multiply(self.integrated_error, gains.i), self.integral_shift)
    }

    /// Lets the integrator decay toward zero instead of dropping it, so the
    /// output does not jump.
    pub fn bleed(&mut self, timesliver: Timesliver) {
        low_pass_filter(
            &mut self.integrated_error,
            ZERO,
            shr(timesliver.raw(), Timesliver::EXTRA_SHIFT),
            INTEGRAL_BLEED_ONE_OVER_PERIOD,
            0,
        );
    }

    pub fn reset(&mut self) {
        self.integrated_error = ZERO;
    }

    pub fn integrated_error(&self) -> FixedPoint {
        self.integrated_error
    }

    pub fn windup_limit(&self) -> FixedPoint {
        self.windup_limit
    }
}

/// `1 + (throttle - 0.5) * factor`: PID authority grows with throttle.
///
/// Applied to the summed PID output so the P/I/D ratio is unchanged. With a
/// factor of 1 the multiplier runs from 0.5 at idle to 1.5 at full throttle.
pub fn gain_schedule_multiplier(throttle: FixedPoint, factor: FixedPoint) -> FixedPoint {
    multiply(throttle - HALF, factor) + ONE
}
