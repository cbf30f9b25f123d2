//! Attitude and altitude estimation.
//!
//! The attitude is carried as two unit vectors in body axes (x forward,
//! y right, z down): `down`, the direction of gravity, and `north`, the
//! horizontal direction of magnetic north. Each iteration both are rotated by
//! the gyro and then pulled toward what the accelerometer (and compass, when
//! fitted) says. Roll, pitch and heading are derived from them for the
//! human-facing logic.

use crate::config::{
    ACC_TRUSTED_ONE_OVER_PERIOD, ACC_TRUST_BAND, ACC_UNTRUSTED_ONE_OVER_PERIOD,
    BARO_ALTITUDE_ONE_OVER_PERIOD, BARO_VELOCITY_GAIN, COMPASS_ONE_OVER_PERIOD, GRAVITY,
};
use crate::math::{
    abs, atan2, fp_ratio, low_pass_filter, multiply, shr, sqrt, Axis, FixedPoint, Vector3,
    DEG_TO_RAD, ONE, ZERO,
};
use crate::time::Timesliver;

/// Below this squared magnitude a vector carries no usable direction.
const MIN_DIRECTION_LENGTH_SQUARED: FixedPoint = fp_ratio(1, 100);

// ── Attitude ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttitudeEstimator {
    down: Vector3,
    north: Vector3,
    /// Roll, pitch, heading in degrees.
    euler: Vector3,
    accelerometer_trusted: bool,
}

impl Default for AttitudeEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl AttitudeEstimator {
    pub const fn new() -> Self {
        Self {
            down: Vector3::new(ZERO, ZERO, ONE),
            north: Vector3::new(ONE, ZERO, ZERO),
            euler: Vector3::ZERO,
            accelerometer_trusted: true,
        }
    }

    /// Snaps the down vector to a still accelerometer reading so the first
    /// seconds after power-up do not read as a tilt.
    pub fn align(&mut self, accelerometer: Vector3) {
        if accelerometer.length_squared() > MIN_DIRECTION_LENGTH_SQUARED {
            self.down = accelerometer.normalized();
            self.north = orthogonal_to(self.north, self.down);
            self.update_euler();
        }
    }

    /// Advances the estimate by one iteration.
    ///
    /// `gyro` is in degrees per second, `accelerometer` in g (reading `+z`
    /// when level), `compass` the raw field direction if a compass is fitted.
    pub fn update(
        &mut self,
        gyro: Vector3,
        accelerometer: Vector3,
        compass: Option<Vector3>,
        timesliver: Timesliver,
    ) {
        let rotation = rotation_angles(gyro, timesliver);
        self.down = rotate(self.down, rotation);
        self.north = rotate(self.north, rotation);

        let length_squared = accelerometer.length_squared();
        if length_squared > MIN_DIRECTION_LENGTH_SQUARED {
            self.accelerometer_trusted = abs(sqrt(length_squared) - ONE) < ACC_TRUST_BAND;
            let one_over_period = if self.accelerometer_trusted {
                ACC_TRUSTED_ONE_OVER_PERIOD
            } else {
                ACC_UNTRUSTED_ONE_OVER_PERIOD
            };
            let measured = accelerometer.normalized();
            blend(&mut self.down, measured, timesliver, one_over_period);
        } else {
            self.accelerometer_trusted = false;
        }
        self.down = self.down.normalized();

        if let Some(field) = compass {
            let horizontal = field - self.down.scale(field.dot(&self.down));
            if horizontal.length_squared() > MIN_DIRECTION_LENGTH_SQUARED {
                blend(&mut self.north, horizontal.normalized(), timesliver, COMPASS_ONE_OVER_PERIOD);
            }
        }
        self.north = orthogonal_to(self.north, self.down);

        self.update_euler();
    }

    fn update_euler(&mut self) {
        let d = self.down;
        self.euler[Axis::Roll] = atan2(d.y, d.z);
        let level_length = sqrt(multiply(d.y, d.y) + multiply(d.z, d.z));
        self.euler[Axis::Pitch] = atan2(-d.x, level_length);
        let east = d.cross(&self.north);
        self.euler[Axis::Yaw] = atan2(east.x, self.north.x);
    }

    pub fn down(&self) -> Vector3 {
        self.down
    }

    pub fn north(&self) -> Vector3 {
        self.north
    }

    /// Roll, pitch and heading in degrees, each in (-180, 180].
    pub fn euler(&self) -> Vector3 {
        self.euler
    }

    pub fn heading(&self) -> FixedPoint {
        self.euler[Axis::Yaw]
    }

    /// Whether the last accelerometer sample was close enough to 1 g to be
    /// trusted as a gravity reference.
    pub fn accelerometer_trusted(&self) -> bool {
        self.accelerometer_trusted
    }
}

/// Gyro rate integrated over the iteration, in radians, still carrying the
/// timesliver's extra precision bits.
fn rotation_angles(gyro: Vector3, timesliver: Timesliver) -> Vector3 {
    gyro.map(|rate| multiply(multiply(rate, timesliver.raw()), DEG_TO_RAD))
}

/// Small-angle rotation of a world-fixed vector seen from a body turning by
/// `angles`: `v + v × θ`.
fn rotate(v: Vector3, angles: Vector3) -> Vector3 {
    let delta = v.cross(&angles).map(|c| shr(c, Timesliver::EXTRA_SHIFT));
    v + delta
}

fn blend(
    estimate: &mut Vector3,
    measured: Vector3,
    timesliver: Timesliver,
    one_over_period: FixedPoint,
) {
    for axis in Axis::ALL {
        low_pass_filter(
            &mut estimate[axis],
            measured[axis],
            timesliver.raw(),
            one_over_period,
            Timesliver::EXTRA_SHIFT,
        );
    }
}

/// `v` with its component along the unit vector `axis` removed, normalized.
fn orthogonal_to(v: Vector3, axis: Vector3) -> Vector3 {
    let projected = v - axis.scale(v.dot(&axis));
    if projected.length_squared() > MIN_DIRECTION_LENGTH_SQUARED {
        projected.normalized()
    } else {
        v
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AttitudeEstimator {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "attitude {} trusted={}", self.euler, self.accelerometer_trusted)
    }
}

// ── Altitude ──────────────────────────────────────────────────────────────────

/// Complementary filter over the vertical accelerometer and the barometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AltitudeEstimator {
    altitude: FixedPoint,
    velocity: FixedPoint,
    has_reference: bool,
}

impl AltitudeEstimator {
    pub const fn new() -> Self {
        Self { altitude: ZERO, velocity: ZERO, has_reference: false }
    }

    /// `barometer` is the latest barometric altitude in meters, or `None`
    /// when no barometer is fitted. Without one the estimate stays at zero.
    pub fn update(
        &mut self,
        accelerometer: Vector3,
        down: Vector3,
        barometer: Option<FixedPoint>,
        timesliver: Timesliver,
    ) {
        let Some(baro_altitude) = barometer else {
            return;
        };
        if !self.has_reference {
            self.altitude = baro_altitude;
            self.velocity = ZERO;
            self.has_reference = true;
            return;
        }

        // Specific force along gravity reads 1 g at rest.
        let vertical_acceleration = multiply(accelerometer.dot(&down) - ONE, GRAVITY);
        self.velocity += integrate(vertical_acceleration, timesliver);

        let error = baro_altitude - self.altitude;
        self.velocity += integrate(multiply(error, BARO_VELOCITY_GAIN), timesliver);

        self.altitude += integrate(self.velocity, timesliver);
        low_pass_filter(
            &mut self.altitude,
            baro_altitude,
            timesliver.raw(),
            BARO_ALTITUDE_ONE_OVER_PERIOD,
            Timesliver::EXTRA_SHIFT,
        );
    }

    /// Meters, same datum as the barometer.
    pub fn altitude(&self) -> FixedPoint {
        self.altitude
    }

    /// Meters per second, positive climbing.
    pub fn velocity(&self) -> FixedPoint {
        self.velocity
    }
}

/// `rate * dt` in plain fixed point.
fn integrate(rate: FixedPoint, timesliver: Timesliver) -> FixedPoint {
    shr(multiply(rate, timesliver.raw()), Timesliver::EXTRA_SHIFT)
}
