use cortex_m::asm;
use embassy_stm32::gpio::{AnyPin, Level, Output, Speed};
use quadcore::config::{MAX_MOTOR_PULSE_US, MIN_MOTOR_PULSE_US};
use quadcore::control::{MotorOutput, MOTOR_COUNT};

/// DShot throttle values; 0 is the stop command, 1..=47 are special commands.
const DSHOT_THROTTLE_MIN: u16 = 48;
const DSHOT_THROTTLE_MAX: u16 = 2047;

pub struct Dshot300 {
    pin: Output<'static, AnyPin>,
}

impl Dshot300 {
    /// 3.33 µs bit at 168 MHz; a one is high for 75 % of it, a zero for 37.5 %.
    const BIT_CYCLES: u32 = 560;
    const ONE_HIGH_CYCLES: u32 = 420;
    const ZERO_HIGH_CYCLES: u32 = 210;
    const FRAME_GAP_CYCLES: u32 = 5200;

    pub fn new(pin: AnyPin) -> Self {
        Self { pin: Output::new(pin, Level::Low, Speed::VeryHigh) }
    }

    /// Sends one throttle value (or special command below 48).
    pub fn send(&mut self, value: u16, telemetry: bool) {
        let frame = dshot_frame(value, telemetry);
        // Interrupts off for the ~60 µs frame; a UART interrupt mid-bit
        // corrupts the timing.
        critical_section::with(|_| {
            for bit in (0..16).rev().map(|i| frame & (1 << i) != 0) {
                let high = if bit { Self::ONE_HIGH_CYCLES } else { Self::ZERO_HIGH_CYCLES };
                self.pin.set_high();
                asm::delay(high);
                self.pin.set_low();
                asm::delay(Self::BIT_CYCLES - high);
            }
            asm::delay(Self::FRAME_GAP_CYCLES);
        });
    }
}

/// 11-bit value, telemetry request bit, then the XOR of the three nibbles.
pub fn dshot_frame(value: u16, telemetry: bool) -> u16 {
    let payload = ((value & 0x07FF) << 1) | telemetry as u16;
    let crc = (payload ^ (payload >> 4) ^ (payload >> 8)) & 0x0F;
    (payload << 4) | crc
}

/// 1000 µs is stop; above it the pulse range maps linearly onto the DShot
/// throttle range.
pub fn pulse_to_dshot(pulse_us: u16) -> u16 {
    if pulse_us <= MIN_MOTOR_PULSE_US {
        return 0;
    }
    let above = (pulse_us.min(MAX_MOTOR_PULSE_US) - MIN_MOTOR_PULSE_US) as u32;
    let span = (DSHOT_THROTTLE_MAX - DSHOT_THROTTLE_MIN) as u32;
    let range = (MAX_MOTOR_PULSE_US - MIN_MOTOR_PULSE_US) as u32;
    DSHOT_THROTTLE_MIN + (above * span / range) as u16
}

/// The four ESCs in mixer order.
pub struct DshotMotors {
    escs: [Dshot300; MOTOR_COUNT],
}

impl DshotMotors {
    pub fn new(escs: [Dshot300; MOTOR_COUNT]) -> Self {
        Self { escs }
    }
}

impl MotorOutput for DshotMotors {
    fn set_motor(&mut self, index: usize, pulse_us: u16) {
        if let Some(esc) = self.escs.get_mut(index) {
            esc.send(pulse_to_dshot(pulse_us), false);
        }
    }
}
