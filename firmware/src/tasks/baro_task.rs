use embassy_executor::task;
use embassy_stm32::i2c::I2c;
use embassy_stm32::peripherals::{DMA1_CH0, DMA1_CH7, I2C1};
use embassy_time::{Duration, Ticker, Timer};
use quadcore::math::FixedPoint;

use crate::drivers::spl06::{pressure_altitude, BaroError, Spl06};
use crate::link::Sample;

const BARO_RATE_HZ: u64 = 16;

/// Barometer task: reads the SPL06 at its measurement rate and publishes
/// the altitude above the first reading.
#[task]
pub async fn baro_task(
    mut i2c: I2c<'static, I2C1, DMA1_CH7, DMA1_CH0>,
    altitude: &'static Sample<FixedPoint>,
) {
    let mut baro = Spl06::new();
    while let Err(e) = baro.init(&mut i2c).await {
        match e {
            BaroError::Bus(e) => defmt::warn!("spl06 init: {}", e),
            BaroError::WrongIdentity(id) => defmt::warn!("spl06 init: chip id {=u8:#x}", id),
        }
        Timer::after(Duration::from_secs(1)).await;
    }
    defmt::info!("spl06 ready");

    let mut ground: Option<f32> = None;
    let mut ticker = Ticker::every(Duration::from_hz(BARO_RATE_HZ));
    loop {
        ticker.next().await;

        match baro.read_pressure(&mut i2c) {
            Ok(pressure) => {
                let meters = pressure_altitude(pressure);
                let ground = *ground.get_or_insert(meters);
                altitude.signal(FixedPoint::saturating_from_num(meters - ground));
            }
            Err(e) => defmt::debug!("spl06 read: {}", e),
        }
    }
}
