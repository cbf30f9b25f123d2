use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_stm32::peripherals::{DMA1_CH1, DMA1_CH3, USART3};
use embassy_stm32::usart::Uart;
use embassy_time::{Duration, Timer};
use quadcore::sensors::GpsFix;

use crate::drivers::gps::NmeaParser;
use crate::link::Sample;

/// Receivers report at 10 Hz; this long without a byte means the link is gone.
const SILENCE_TIMEOUT: Duration = Duration::from_millis(2500);

/// GPS task: reads NMEA from USART3 and publishes every new fix.
#[task]
pub async fn gps_task(mut gps_uart: Uart<'static, USART3, DMA1_CH3, DMA1_CH1>, fixes: &'static Sample<GpsFix>) {
    let mut parser = NmeaParser::new();
    let mut buf = [0u8; 512];
    let mut receiving = false;

    loop {
        match select(gps_uart.read_until_idle(&mut buf), Timer::after(SILENCE_TIMEOUT)).await {
            Either::First(Ok(n)) => {
                if !receiving {
                    defmt::info!("gps receiving");
                    receiving = true;
                }
                if let Some(fix) = parser.push_data(&buf[..n]) {
                    fixes.signal(fix);
                }
            }
            Either::First(Err(e)) => {
                defmt::debug!("gps uart: {}, {=u32} bad checksums", e, parser.checksum_errors());
            }
            Either::Second(()) => {
                if receiving {
                    defmt::warn!("gps silent");
                    receiving = false;
                }
            }
        }
    }
}
