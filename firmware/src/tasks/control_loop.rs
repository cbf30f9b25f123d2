use core::cell::RefCell;

use embassy_executor::task;
use embassy_stm32::dma::NoDma;
use embassy_stm32::peripherals::{SPI1, SPI3};
use embassy_time::{Duration, Ticker};
use quadcore::math::FixedPoint;
use quadcore::persist;
use quadcore::sensors::GpsFix;
use quadcore::time::Clock;
use quadcore::{FlightController, LoopIo};

use crate::board::{BoardLed, IMU_ORIENTATION, REVERSE_YAW};
use crate::clock::EmbassyTicks;
use crate::drivers::crsf::CrsfReceiver;
use crate::drivers::dshot::DshotMotors;
use crate::drivers::flash::W25qxx;
use crate::drivers::icm42688::{Icm42688, ImuAccelerometer, ImuGyro};
use crate::link::LatestSample;
use crate::tasks::crsf_task::CRSF_RING_LEN;

/// Iteration rate. The core measures each timesliver, so this only needs
/// to be steady, not exact.
const LOOP_HZ: u64 = 500;

/// Everything the control loop owns.
pub struct ControlHardware {
    pub imu: Icm42688<'static, SPI1>,
    pub receiver: CrsfReceiver<CRSF_RING_LEN>,
    pub motors: DshotMotors,
    pub flash: W25qxx<'static, SPI3, NoDma, NoDma>,
    pub led: BoardLed,
    pub barometer: LatestSample<FixedPoint>,
    pub gps: LatestSample<GpsFix>,
}

#[task]
pub async fn control_loop_task(hardware: ControlHardware) {
    let ControlHardware { imu, mut receiver, mut motors, mut flash, mut led, mut barometer, mut gps } =
        hardware;

    let imu = RefCell::new(imu);
    let mut gyro = ImuGyro::new(&imu, IMU_ORIENTATION);
    let mut accelerometer = ImuAccelerometer::new(&imu, IMU_ORIENTATION);

    flash.probe();
    let mut loaded = persist::load(&mut flash);
    if !loaded.from_persistent_store {
        loaded.settings.output.reverse_yaw = REVERSE_YAW;
    }
    let mut controller = FlightController::new(Clock::new(EmbassyTicks), loaded);

    let mut io = LoopIo {
        gyro: &mut gyro,
        accelerometer: &mut accelerometer,
        barometer: Some(&mut barometer),
        compass: None,
        gps: Some(&mut gps),
        receiver: &mut receiver,
        motors: &mut motors,
        battery: None,
        leds: Some(&mut led),
    };

    if let Err(e) = controller.initialize(&mut io) {
        // Without the IMU nothing can fly; the motors were never armed.
        defmt::error!("imu unavailable: {}", e);
        return;
    }

    let mut ticker = Ticker::every(Duration::from_hz(LOOP_HZ));
    loop {
        ticker.next().await;

        let outcome = controller.step(&mut io);
        if outcome.calibration_requested {
            match controller.calibrate_and_save(&mut io, &mut flash) {
                Ok(()) => defmt::info!("calibrated and saved"),
                Err(e) => defmt::error!("calibration: {}", e),
            }
        }
    }
}
