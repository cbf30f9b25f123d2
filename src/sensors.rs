//! Sensor capability interface and the data shapes sensors hand to the core.
//!
//! Chip drivers live with the board; the core only sees calibrated physical
//! units in body axes:
//!
//! | sensor        | reading                                       |
//! |---------------|-----------------------------------------------|
//! | gyro          | [`Vector3`], degrees per second               |
//! | accelerometer | [`Vector3`], g, pointing down (level = +z)     |
//! | barometer     | [`FixedPoint`], meters above start            |
//! | compass       | [`Vector3`], field direction, arbitrary scale |
//! | GPS           | [`GpsFix`]                                    |

use crate::error::SensorError;
use crate::math::{shl, FixedPoint, Vector3};

/// A sensor the control loop can initialize once and poll every iteration.
pub trait SensorDriver {
    type Reading: Copy;

    fn init(&mut self) -> Result<(), SensorError>;

    fn read(&mut self) -> Result<Self::Reading, SensorError>;
}

/// One body axis picked from a raw sensor axis, optionally negated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisSource {
    pub raw_axis: u8,
    pub negate: bool,
}

impl AxisSource {
    pub const fn plus(raw_axis: u8) -> Self {
        Self { raw_axis, negate: false }
    }

    pub const fn minus(raw_axis: u8) -> Self {
        Self { raw_axis, negate: true }
    }
}

/// Per-board mapping from chip axes to body axes (x forward, y right, z down).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Orientation {
    pub x: AxisSource,
    pub y: AxisSource,
    pub z: AxisSource,
}

impl Orientation {
    pub const IDENTITY: Orientation = Orientation {
        x: AxisSource::plus(0),
        y: AxisSource::plus(1),
        z: AxisSource::plus(2),
    };

    pub fn apply(&self, raw: [FixedPoint; 3]) -> Vector3 {
        let pick = |source: AxisSource| {
            let value = raw[source.raw_axis as usize % 3];
            if source.negate {
                -value
            } else {
                value
            }
        };
        Vector3::new(pick(self.x), pick(self.y), pick(self.z))
    }
}

/// Latitude or longitude in degrees, carried with
/// [`Coordinate::EXTRA_SHIFT`] extra fractional bits (~3 cm resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct Coordinate(FixedPoint);

impl Coordinate {
    pub const EXTRA_SHIFT: u32 = 6;

    /// From the 1e-7 degree integers GPS receivers report.
    pub fn from_degrees_e7(value: i32) -> Self {
        // 2^(16 + 6) / 10^7
        let raw = (value as i64 * (1 << (16 + Self::EXTRA_SHIFT))) / 10_000_000;
        Self(FixedPoint::from_bits(raw as i32))
    }

    pub const fn from_degrees(degrees: FixedPoint) -> Self {
        Self(shl(degrees, Self::EXTRA_SHIFT))
    }

    /// Degrees scaled by `2^EXTRA_SHIFT`.
    pub const fn raw(&self) -> FixedPoint {
        self.0
    }

    pub fn degrees(&self) -> FixedPoint {
        crate::math::shr(self.0, Self::EXTRA_SHIFT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpsFix {
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    /// Ground speed in meters per second.
    pub ground_speed: FixedPoint,
    /// Course over ground in degrees from north.
    pub course: FixedPoint,
    pub satellites: u8,
}

#[cfg(feature = "defmt")]
impl defmt::Format for GpsFix {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "GpsFix {{ lat: {}, lon: {}, sats: {} }}",
            self.latitude.degrees().to_num::<f32>(),
            self.longitude.degrees().to_num::<f32>(),
            self.satellites
        )
    }
}

/// Fault counters for the optional and mandatory sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorFaults {
    pub gyro: u32,
    pub accelerometer: u32,
    pub barometer: u32,
    pub compass: u32,
    pub gps: u32,
}

/// Reads `driver` once. A fresh sample comes back as `Some`; a sample that
/// is simply not ready yet is `None`; any other failure is also `None` and
/// bumps `faults`, so the caller keeps using its previous value.
pub fn poll_sensor<S: SensorDriver + ?Sized>(driver: &mut S, faults: &mut u32) -> Option<S::Reading> {
    match driver.read() {
        Ok(reading) => Some(reading),
        Err(SensorError::NotReady) => None,
        Err(_) => {
            *faults = faults.wrapping_add(1);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fp;

    struct Flaky {
        calls: u32,
    }

    impl SensorDriver for Flaky {
        type Reading = FixedPoint;

        fn init(&mut self) -> Result<(), SensorError> {
            Ok(())
        }

        fn read(&mut self) -> Result<FixedPoint, SensorError> {
            self.calls += 1;
            match self.calls {
                1 => Ok(fp(3)),
                2 => Err(SensorError::Bus),
                3 => Err(SensorError::NotReady),
                _ => Ok(fp(4)),
            }
        }
    }

    #[test]
    fn orientation_permutes_and_negates() {
        // Board with the chip rotated 90° and mounted upside down.
        let board = Orientation {
            x: AxisSource::minus(1),
            y: AxisSource::plus(0),
            z: AxisSource::minus(2),
        };
        let v = board.apply([fp(1), fp(2), fp(3)]);
        assert_eq!(v, Vector3::new(fp(-2), fp(1), fp(-3)));
        assert_eq!(Orientation::IDENTITY.apply([fp(1), fp(2), fp(3)]), Vector3::new(fp(1), fp(2), fp(3)));
    }

    #[test]
    fn bus_faults_are_counted_not_ready_is_not() {
        let mut sensor = Flaky { calls: 0 };
        let mut faults = 0;
        assert_eq!(poll_sensor(&mut sensor, &mut faults), Some(fp(3)));
        assert_eq!(poll_sensor(&mut sensor, &mut faults), None);
        assert_eq!(faults, 1);
        assert_eq!(poll_sensor(&mut sensor, &mut faults), None);
        assert_eq!(faults, 1);
        assert_eq!(poll_sensor(&mut sensor, &mut faults), Some(fp(4)));
    }

    #[test]
    fn coordinates_from_receiver_integers() {
        let lat = Coordinate::from_degrees_e7(473_977_420); // 47.397742°
        let degrees = lat.raw().to_num::<f64>() / 64.0;
        assert!((degrees - 47.397742).abs() < 1e-6);
        assert_eq!(Coordinate::from_degrees(fp(10)).degrees(), fp(10));
    }
}
