use embassy_stm32::gpio::{AnyPin, Level, Output};
use embassy_stm32::rcc::{APBPrescaler, Hse, HseMode, Pll, PllMul, PllPDiv, PllPreDiv, PllSource, Sysclk};
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::{Config, Peripherals};
use quadcore::sensors::{AxisSource, Orientation};
use quadcore::status::{LedMask, StatusLeds};

/// ICM-42688 mounting: chip x to the left of the nose, chip y forward,
/// chip z up.
pub const IMU_ORIENTATION: Orientation = Orientation {
    x: AxisSource::plus(1),
    y: AxisSource::minus(0),
    z: AxisSource::minus(2),
};

/// Props mounted for the opposite rotation from the mixer's layout. Seeds
/// the setting when nothing has been saved yet.
pub const REVERSE_YAW: bool = false;

/// 8 MHz crystal, PLL to a 168 MHz core clock. The DShot bit timing
/// counts cycles at this rate. APB1 stays at its 42 MHz limit, APB2 at 84.
/// No USB, so the 48 MHz PLL output is left off.
fn clock_config() -> Config {
    let mut config = Config::default();
    config.rcc.hse = Some(Hse { freq: TimeHertz(8_000_000), mode: HseMode::Oscillator });
    config.rcc.pll_src = PllSource::HSE;
    config.rcc.pll = Some(Pll {
        prediv: PllPreDiv::DIV4,
        mul: PllMul::MUL168,
        divp: Some(PllPDiv::DIV2),
        divq: None,
        divr: None,
    });
    config.rcc.sys = Sysclk::PLL1_P;
    config.rcc.apb1_pre = APBPrescaler::DIV4;
    config.rcc.apb2_pre = APBPrescaler::DIV2;
    config
}

pub fn init() -> Peripherals {
    embassy_stm32::init(clock_config())
}

/// The board has a single status LED; it is lit whenever any arm LED of the
/// pattern would be.
pub struct BoardLed {
    pin: Output<'static, AnyPin>,
}

impl BoardLed {
    pub fn new(pin: Output<'static, AnyPin>) -> Self {
        Self { pin }
    }
}

impl StatusLeds for BoardLed {
    fn set_leds(&mut self, mask: LedMask) {
        let level = if mask.is_empty() { Level::Low } else { Level::High };
        self.pin.set_level(level);
    }
}
