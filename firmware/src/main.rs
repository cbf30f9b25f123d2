#![no_std]
#![no_main]

mod board;
mod clock;
mod drivers;
mod link;
mod tasks;

use embassy_executor::Spawner;
use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{Level, Output, Pin, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::usart::{Config as UsartConfig, Uart};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_time::{Duration, Timer};
use quadcore::math::FixedPoint;
use quadcore::ring_buffer::ByteRing;
use quadcore::sensors::GpsFix;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::board::BoardLed;
use crate::drivers::crsf::CrsfReceiver;
use crate::drivers::dshot::{Dshot300, DshotMotors};
use crate::drivers::flash::W25qxx;
use crate::drivers::icm42688::Icm42688;
use crate::link::{LatestSample, Sample};
use crate::tasks::control_loop::{control_loop_task, ControlHardware};
use crate::tasks::crsf_task::CRSF_RING_LEN;

// ── Task links ────────────────────────────────────────────────────────────────
static CRSF_RING: StaticCell<ByteRing<CRSF_RING_LEN>> = StaticCell::new();
static BARO_ALTITUDE: Sample<FixedPoint> = Sample::new();
static GPS_FIX: Sample<GpsFix> = Sample::new();

// ── Interrupt bindings ────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    I2C1_EV  => embassy_stm32::i2c::EventInterruptHandler<peripherals::I2C1>;
    I2C1_ER  => embassy_stm32::i2c::ErrorInterruptHandler<peripherals::I2C1>;
    UART4    => embassy_stm32::usart::InterruptHandler<peripherals::UART4>;
    USART3   => embassy_stm32::usart::InterruptHandler<peripherals::USART3>;
});

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let p = board::init();
    defmt::info!("quadcore starting");

    // 2. I2C1 @ 400 kHz: SPL06 Baro (SCL=PB8, SDA=PB9)
    let i2c = I2c::new(
        p.I2C1,
        p.PB8, p.PB9,
        Irqs,
        p.DMA1_CH7,
        p.DMA1_CH0,
        TimeHertz(400_000),
        Default::default(),
    );

    // 3. SPI1 @ 10 MHz: ICM-42688 IMU (SCK=PA5, MOSI=PA7, MISO=PA6, CS=PB12)
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = TimeHertz(10_000_000);
    let spi = Spi::new(
        p.SPI1,
        p.PA5, p.PA7, p.PA6,
        NoDma, NoDma,
        spi_config,
    );
    let cs_gyro = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);
    let imu = Icm42688::new(spi, cs_gyro);

    // 4. SPI3 @ 20 MHz: W25Qxx settings flash (SCK=PC10, MOSI=PC12, MISO=PC11, CS=PA15)
    let mut flash_config = SpiConfig::default();
    flash_config.frequency = TimeHertz(20_000_000);
    let flash_spi = Spi::new(
        p.SPI3,
        p.PC10, p.PC12, p.PC11,
        NoDma, NoDma,
        flash_config,
    );
    let cs_flash = Output::new(p.PA15.degrade(), Level::High, Speed::VeryHigh);
    let flash = W25qxx::new(flash_spi, cs_flash);

    // 5. DShot300 motors, mixer order FR, RR, FL, RL
    let motors = DshotMotors::new([
        Dshot300::new(p.PB0.degrade()),
        Dshot300::new(p.PB1.degrade()),
        Dshot300::new(p.PA3.degrade()),
        Dshot300::new(p.PA2.degrade()),
    ]);

    // 6. GPS USART3 @ 115200 (TX=PB10, RX=PB11)
    let mut gps_config = UsartConfig::default();
    gps_config.baudrate = 115_200;
    let gps_uart = defmt::unwrap!(Uart::new(
        p.USART3, p.PB11, p.PB10,
        Irqs,
        p.DMA1_CH3, p.DMA1_CH1,
        gps_config,
    ));

    // 7. CRSF/ELRS UART4 @ 420000 (TX=PA0, RX=PA1), receive side only
    let mut crsf_config = UsartConfig::default();
    crsf_config.baudrate = 420_000;
    let crsf_uart = defmt::unwrap!(Uart::new(
        p.UART4, p.PA1, p.PA0,
        Irqs,
        p.DMA1_CH4, p.DMA1_CH2,
        crsf_config,
    ));
    let (_crsf_uart_tx, crsf_uart_rx) = crsf_uart.split();
    let (crsf_bytes_in, crsf_bytes_out) = CRSF_RING.init(ByteRing::new()).split();

    // 8. Status LED (PC13)
    let led = BoardLed::new(Output::new(p.PC13.degrade(), Level::Low, Speed::Low));

    // 9. Let the sensors power up before the control loop probes them
    Timer::after(Duration::from_millis(100)).await;

    // 10. Spawn all tasks
    spawner.must_spawn(tasks::crsf_task::crsf_task(crsf_uart_rx, crsf_bytes_in));
    spawner.must_spawn(tasks::baro_task::baro_task(i2c, &BARO_ALTITUDE));
    spawner.must_spawn(tasks::gps_task::gps_task(gps_uart, &GPS_FIX));
    spawner.must_spawn(control_loop_task(ControlHardware {
        imu,
        receiver: CrsfReceiver::new(crsf_bytes_out),
        motors,
        flash,
        led,
        barometer: LatestSample::new(&BARO_ALTITUDE),
        gps: LatestSample::new(&GPS_FIX),
    }));
}
