//! Battery supervision and the status LED blink patterns.

use bitflags::bitflags;

use crate::config::{
    BATTERY_ONE_OVER_PERIOD, LED_BATTERY_ON_AFTER_US, LED_BATTERY_PERIOD_US,
    LED_DISARMED_ON_AFTER_US, LED_DISARMED_PERIOD_US, LED_FAILSAFE_PERIOD_US,
    LED_FAILSAFE_SWAP_AFTER_US,
};
use crate::math::{low_pass_filter, FixedPoint, ZERO};
use crate::time::Timesliver;

/// Board-specific voltage measurement. How the ADC gets there (reference
/// channel alternation, divider ratio) stays with the board.
pub trait BatteryMonitor {
    /// Battery volts when a new measurement finished since the last call.
    fn poll_voltage(&mut self) -> Option<FixedPoint>;
}

bitflags! {
    /// One bit per arm LED.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LedMask: u8 {
        const FRONT_RIGHT = 1 << 0;
        const REAR_RIGHT = 1 << 1;
        const FRONT_LEFT = 1 << 2;
        const REAR_LEFT = 1 << 3;
        const ALL = Self::FRONT_RIGHT.bits()
            | Self::REAR_RIGHT.bits()
            | Self::FRONT_LEFT.bits()
            | Self::REAR_LEFT.bits();
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LedMask {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "LedMask({=u8:#b})", self.bits())
    }
}

pub trait StatusLeds {
    fn set_leds(&mut self, mask: LedMask);
}

/// Filtered battery voltage and the under-voltage flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatteryState {
    voltage: FixedPoint,
    low: bool,
    seen: bool,
}

impl BatteryState {
    pub const fn new() -> Self {
        Self { voltage: ZERO, low: false, seen: false }
    }

    /// Folds in a new measurement. The first one is taken as is; later ones
    /// are low-passed because the voltage sags under motor load.
    pub fn update(&mut self, measured: FixedPoint, timesliver: Timesliver, limit: FixedPoint) -> bool {
        if self.seen {
            low_pass_filter(
                &mut self.voltage,
                measured,
                timesliver.raw(),
                BATTERY_ONE_OVER_PERIOD,
                Timesliver::EXTRA_SHIFT,
            );
        } else {
            self.voltage = measured;
            self.seen = true;
        }

        let low = self.voltage < limit;
        if low && !self.low {
            warn!("battery low: {=f32} V", self.voltage.to_num::<f32>());
        }
        self.low = low;
        low
    }

    pub fn voltage(&self) -> FixedPoint {
        self.voltage
    }

    pub fn is_low(&self) -> bool {
        self.low
    }
}

/// LEDs to show at `now`, most urgent condition first: low battery blinks
/// everything slowly, failsafe alternates the diagonals fast, disarmed gives
/// a short flash and armed is steady on.
pub fn led_pattern(now_micros: u32, battery_low: bool, failsafe: bool, armed: bool) -> LedMask {
    let phase = |period: u32| now_micros % period;
    if battery_low {
        if phase(LED_BATTERY_PERIOD_US) > LED_BATTERY_ON_AFTER_US {
            LedMask::ALL
        } else {
            LedMask::empty()
        }
    } else if failsafe {
        if phase(LED_FAILSAFE_PERIOD_US) > LED_FAILSAFE_SWAP_AFTER_US {
            LedMask::FRONT_RIGHT | LedMask::REAR_LEFT
        } else {
            LedMask::FRONT_LEFT | LedMask::REAR_RIGHT
        }
    } else if !armed {
        if phase(LED_DISARMED_PERIOD_US) > LED_DISARMED_ON_AFTER_US {
            LedMask::ALL
        } else {
            LedMask::empty()
        }
    } else {
        LedMask::ALL
    }
}
