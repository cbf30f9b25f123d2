use embassy_stm32::i2c::{Error, I2c, Instance, RxDma, TxDma};
use embassy_time::{Duration, Timer};
use micromath::F32Ext;

const ADDR: u8 = 0x76;
const REG_PRESS_DATA: u8 = 0x00;
const REG_TEMP_DATA: u8 = 0x03;
const REG_PRS_CFG: u8 = 0x06;
const REG_TMP_CFG: u8 = 0x07;
const REG_MEAS_CFG: u8 = 0x08;
const REG_RESET: u8 = 0x0C;
const REG_CHIP_ID: u8 = 0x0D;
const REG_COEF: u8 = 0x10;

const CHIP_ID: u8 = 0x10;
const MEAS_CFG_COEF_READY: u8 = 0x80;

/// Datasheet scale factor for 8x oversampling, pressure and temperature.
const SCALE_8X: f32 = 7_864_320.0;
const SEA_LEVEL_PA: f32 = 101_325.0;

#[derive(Debug)]
pub enum BaroError {
    Bus(Error),
    WrongIdentity(u8),
}

impl From<Error> for BaroError {
    fn from(e: Error) -> Self {
        BaroError::Bus(e)
    }
}

#[derive(Default, Debug, Clone, Copy)]
struct Spl06Coeffs {
    c0: i16,
    c1: i16,
    c00: i32,
    c10: i32,
    c01: i16,
    c11: i16,
    c20: i16,
    c21: i16,
    c30: i16,
}

/// Sign-extends the low `bits` of `value`.
fn sign_extend(value: i32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (value << shift) >> shift
}

pub struct Spl06 {
    coeffs: Spl06Coeffs,
}

impl Spl06 {
    pub fn new() -> Self {
        Self { coeffs: Spl06Coeffs::default() }
    }

    /// Soft reset, identity check, calibration coefficients, then continuous
    /// pressure and temperature at 16 Hz, 8x oversampling.
    pub async fn init<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<(), BaroError> {
        write_reg(i2c, REG_RESET, 0x09)?;
        Timer::after(Duration::from_millis(50)).await;

        let id = read_reg(i2c, REG_CHIP_ID)?;
        if id != CHIP_ID {
            return Err(BaroError::WrongIdentity(id));
        }

        while read_reg(i2c, REG_MEAS_CFG)? & MEAS_CFG_COEF_READY == 0 {
            Timer::after(Duration::from_millis(10)).await;
        }
        self.read_coeffs(i2c)?;

        write_reg(i2c, REG_PRS_CFG, 0x43)?;
        // External temperature sensor, 8x.
        write_reg(i2c, REG_TMP_CFG, 0x83)?;
        write_reg(i2c, REG_MEAS_CFG, 0x07)?;
        Timer::after(Duration::from_millis(50)).await;
        Ok(())
    }

    fn read_coeffs<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<(), Error> {
        let mut buf = [0u8; 18];
        i2c.blocking_write_read(ADDR, &[REG_COEF], &mut buf)?;
        let b = |i: usize| buf[i] as i32;
        let word = |i: usize| i16::from_be_bytes([buf[i], buf[i + 1]]);

        self.coeffs = Spl06Coeffs {
            c0: sign_extend((b(0) << 4) | (b(1) >> 4), 12) as i16,
            c1: sign_extend(((b(1) & 0x0F) << 8) | b(2), 12) as i16,
            c00: sign_extend((b(3) << 12) | (b(4) << 4) | (b(5) >> 4), 20),
            c10: sign_extend(((b(5) & 0x0F) << 16) | (b(6) << 8) | b(7), 20),
            c01: word(8),
            c11: word(10),
            c20: word(12),
            c21: word(14),
            c30: word(16),
        };
        Ok(())
    }

    /// Compensated pressure in pascals.
    pub fn read_pressure<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<f32, Error> {
        let p_sc = read_24bits(i2c, REG_PRESS_DATA)? as f32 / SCALE_8X;
        let t_sc = read_24bits(i2c, REG_TEMP_DATA)? as f32 / SCALE_8X;

        let c = &self.coeffs;
        let pressure = c.c00 as f32
            + p_sc * (c.c10 as f32 + p_sc * (c.c20 as f32 + p_sc * c.c30 as f32))
            + t_sc * c.c01 as f32
            + t_sc * p_sc * (c.c11 as f32 + p_sc * c.c21 as f32);
        Ok(pressure)
    }
}

/// Standard atmosphere altitude for a pressure, meters.
pub fn pressure_altitude(pressure_pa: f32) -> f32 {
    44_330.0 * (1.0 - (pressure_pa / SEA_LEVEL_PA).powf(1.0 / 5.255))
}

fn write_reg<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
    i2c: &mut I2c<'_, T, Tx, Rx>,
    reg: u8,
    val: u8,
) -> Result<(), Error> {
    i2c.blocking_write(ADDR, &[reg, val])
}

fn read_reg<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
    i2c: &mut I2c<'_, T, Tx, Rx>,
    reg: u8,
) -> Result<u8, Error> {
    let mut buf = [0u8; 1];
    i2c.blocking_write_read(ADDR, &[reg], &mut buf)?;
    Ok(buf[0])
}

fn read_24bits<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
    i2c: &mut I2c<'_, T, Tx, Rx>,
    reg: u8,
) -> Result<i32, Error> {
    let mut buf = [0u8; 3];
    i2c.blocking_write_read(ADDR, &[reg], &mut buf)?;
    let raw = ((buf[0] as i32) << 16) | ((buf[1] as i32) << 8) | (buf[2] as i32);
    Ok(sign_extend(raw, 24))
}
