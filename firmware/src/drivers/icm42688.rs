use core::cell::RefCell;

use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::spi::{Instance, Spi};
use embassy_time::{block_for, Duration};
use quadcore::math::{FixedPoint, Vector3};
use quadcore::sensors::{Orientation, SensorDriver};
use quadcore::SensorError;

const REG_DEVICE_CONFIG: u8 = 0x11;
const REG_ACCEL_DATA_X1: u8 = 0x1F;
const REG_PWR_MGMT0: u8 = 0x4E;
const REG_WHO_AM_I: u8 = 0x75;

const WHO_AM_I: u8 = 0x47;

/// Reset full scale is ±2000 dps, 16.4 LSB per degree per second.
const GYRO_LSB_PER_DPS_X10: i64 = 164;
/// Reset full scale is ±16 g, 2048 LSB per g.
const ACCEL_LSB_PER_G_SHIFT: u32 = 11;

pub struct Icm42688<'d, T: Instance> {
    spi: Spi<'d, T, NoDma, NoDma>,
    cs: Output<'d, AnyPin>,
    configured: bool,
}

impl<'d, T: Instance> Icm42688<'d, T> {
    pub fn new(spi: Spi<'d, T, NoDma, NoDma>, cs: Output<'d, AnyPin>) -> Self {
        Self { spi, cs, configured: false }
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        let buf = [reg & 0x7F, value];
        self.cs.set_low();
        let res = self.spi.blocking_write(&buf);
        self.cs.set_high();
        res.map_err(|_| SensorError::Bus)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, SensorError> {
        let tx = [reg | 0x80, 0x00];
        let mut rx = [0u8; 2];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();

        res.map_err(|_| SensorError::Bus)?;
        Ok(rx[1])
    }

    /// Soft reset, identity check, then gyro and accelerometer in low noise
    /// mode at the reset ranges and 1 kHz. Runs once for both views.
    fn configure(&mut self) -> Result<(), SensorError> {
        if self.configured {
            return Ok(());
        }

        self.write_reg(REG_DEVICE_CONFIG, 0x01)?;
        block_for(Duration::from_millis(10));

        let id = self.read_reg(REG_WHO_AM_I)?;
        if id != WHO_AM_I {
            defmt::error!("icm42688: who am i {=u8:#x}", id);
            return Err(SensorError::WrongIdentity);
        }

        self.write_reg(REG_PWR_MGMT0, 0x0F)?;
        block_for(Duration::from_millis(50));

        self.configured = true;
        defmt::info!("icm42688 ready");
        Ok(())
    }

    /// Accelerometer and gyro counts from one burst, chip axes.
    fn read_all(&mut self) -> Result<([i16; 3], [i16; 3]), SensorError> {
        let mut tx = [0u8; 13];
        tx[0] = REG_ACCEL_DATA_X1 | 0x80;
        let mut rx = [0u8; 13];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();
        res.map_err(|_| SensorError::Bus)?;

        let word = |i: usize| i16::from_be_bytes([rx[1 + 2 * i], rx[2 + 2 * i]]);
        Ok(([word(0), word(1), word(2)], [word(3), word(4), word(5)]))
    }
}

fn degrees_per_second(counts: i16) -> FixedPoint {
    FixedPoint::from_bits(((counts as i64 * 10 << 16) / GYRO_LSB_PER_DPS_X10) as i32)
}

fn g(counts: i16) -> FixedPoint {
    FixedPoint::from_bits((counts as i32) << (16 - ACCEL_LSB_PER_G_SHIFT))
}

/// Gyro half of the chip, in body axes.
pub struct ImuGyro<'a, 'd, T: Instance> {
    imu: &'a RefCell<Icm42688<'d, T>>,
    orientation: Orientation,
}

impl<'a, 'd, T: Instance> ImuGyro<'a, 'd, T> {
    pub fn new(imu: &'a RefCell<Icm42688<'d, T>>, orientation: Orientation) -> Self {
        Self { imu, orientation }
    }
}

impl<T: Instance> SensorDriver for ImuGyro<'_, '_, T> {
    type Reading = Vector3;

    fn init(&mut self) -> Result<(), SensorError> {
        self.imu.borrow_mut().configure()
    }

    fn read(&mut self) -> Result<Vector3, SensorError> {
        let (_, gyro) = self.imu.borrow_mut().read_all()?;
        Ok(self.orientation.apply(gyro.map(degrees_per_second)))
    }
}

/// Accelerometer half of the chip. The chip measures specific force, which
/// points up at rest; the core wants the gravity direction.
pub struct ImuAccelerometer<'a, 'd, T: Instance> {
    imu: &'a RefCell<Icm42688<'d, T>>,
    orientation: Orientation,
}

impl<'a, 'd, T: Instance> ImuAccelerometer<'a, 'd, T> {
    pub fn new(imu: &'a RefCell<Icm42688<'d, T>>, orientation: Orientation) -> Self {
        Self { imu, orientation }
    }
}

impl<T: Instance> SensorDriver for ImuAccelerometer<'_, '_, T> {
    type Reading = Vector3;

    fn init(&mut self) -> Result<(), SensorError> {
        self.imu.borrow_mut().configure()
    }

    fn read(&mut self) -> Result<Vector3, SensorError> {
        let (accel, _) = self.imu.borrow_mut().read_all()?;
        Ok(self.orientation.apply(accel.map(g)).map(|v| -v))
    }
}
