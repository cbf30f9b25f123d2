//! Still-on-the-bench zero offsets for the gyro and accelerometer.

use crate::config::{CALIBRATION_INTERVAL_MS, CALIBRATION_SAMPLES};
use crate::error::SensorError;
use crate::math::{FixedPoint, Vector3, ONE};
use crate::sensors::SensorDriver;
use crate::time::{Clock, TickSource};

/// Offsets to subtract from raw readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub gyro: Vector3,
    /// Accelerometer offset with 1 g already taken off the z axis.
    pub accelerometer: Vector3,
}

/// Averages [`CALIBRATION_SAMPLES`] readings of both sensors, one every
/// [`CALIBRATION_INTERVAL_MS`]. The aircraft must sit level and still.
///
/// Blocks for a few hundred milliseconds. Samples that are not ready yet are
/// retried; any other sensor error aborts.
pub fn calibrate_gyro_and_accelerometer<T: TickSource>(
    clock: &Clock<T>,
    gyro: &mut dyn SensorDriver<Reading = Vector3>,
    accelerometer: &mut dyn SensorDriver<Reading = Vector3>,
) -> Result<Calibration, SensorError> {
    let mut gyro_sum = Sum::default();
    let mut acc_sum = Sum::default();
    let mut attempts = 0;

    while gyro_sum.count < CALIBRATION_SAMPLES || acc_sum.count < CALIBRATION_SAMPLES {
        attempts += 1;
        if attempts > CALIBRATION_SAMPLES * 4 {
            warn!("calibration: sensors not delivering samples");
            return Err(SensorError::NotReady);
        }
        clock.delay_ms(CALIBRATION_INTERVAL_MS);

        if gyro_sum.count < CALIBRATION_SAMPLES {
            gyro_sum.add(gyro.read())?;
        }
        if acc_sum.count < CALIBRATION_SAMPLES {
            acc_sum.add(accelerometer.read())?;
        }
    }

    let mut acc_offset = acc_sum.mean();
    acc_offset.z -= ONE;
    let calibration = Calibration { gyro: gyro_sum.mean(), accelerometer: acc_offset };
    info!("calibrated: {}", calibration);
    Ok(calibration)
}

/// Raw-bit accumulator, wide enough that a full batch cannot overflow.
#[derive(Default)]
struct Sum {
    bits: [i64; 3],
    count: u32,
}

impl Sum {
    fn add(&mut self, reading: Result<Vector3, SensorError>) -> Result<(), SensorError> {
        let sample = match reading {
            Ok(sample) => sample,
            Err(SensorError::NotReady) => return Ok(()),
            Err(e) => return Err(e),
        };
        for (total, value) in self.bits.iter_mut().zip([sample.x, sample.y, sample.z]) {
            *total += value.to_bits() as i64;
        }
        self.count += 1;
        Ok(())
    }

    fn mean(&self) -> Vector3 {
        let count = self.count.max(1) as i64;
        let [x, y, z] = self.bits.map(|total| FixedPoint::from_bits((total / count) as i32));
        Vector3::new(x, y, z)
    }
}
