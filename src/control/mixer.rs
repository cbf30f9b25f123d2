//! Motor mixing and the output stage.
//!
//! QuadX motor layout, seen from above with the nose up:
//!
//! ```text
//!   2 (FL)   0 (FR)
//!       \   /
//!        \ /
//!        / \
//!       /   \
//!   3 (RL)   1 (RR)
//! ```
//!
//! Motors 0 and 3 turn clockwise seen from above, 1 and 2 counterclockwise.
//! Positive roll, pitch and yaw corrections roll right, raise the nose and
//! turn the nose right.

use crate::config::{MAX_MOTOR_PULSE_US, MIN_MOTOR_PULSE_US};
use crate::math::{FixedPoint, Vector3, FIXED_POINT_SHIFT};

pub const MOTOR_COUNT: usize = 4;

/// Sink for motor commands: PWM timers, DShot, a test recorder.
pub trait MotorOutput {
    /// `pulse_us` is a servo-style width, 1000 (stopped) to 2000 (full).
    fn set_motor(&mut self, index: usize, pulse_us: u16);
}

/// Throttle plus the signed roll, pitch and yaw corrections for each motor.
pub fn mix_quad_x(throttle: FixedPoint, pid: Vector3) -> [FixedPoint; MOTOR_COUNT] {
    let (roll, pitch, yaw) = (pid.roll(), pid.pitch(), pid.yaw());
    [
        throttle - roll + pitch - yaw,
        throttle - roll - pitch + yaw,
        throttle + roll + pitch + yaw,
        throttle + roll - pitch - yaw,
    ]
}

/// `[0, 1]` to 1000–2000 µs, never below `armed_min_us` so the props keep
/// spinning while armed.
pub fn to_pulse_width(value: FixedPoint, armed_min_us: u16) -> u16 {
    let scaled = (value.to_bits() as i64 * 1000) >> FIXED_POINT_SHIFT;
    let pulse = MIN_MOTOR_PULSE_US as i64 + scaled;
    pulse.clamp(armed_min_us as i64, MAX_MOTOR_PULSE_US as i64) as u16
}

/// Output stage settings that depend on the airframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputConfig {
    pub armed_min_pulse_us: u16,
    /// Flips the yaw correction for frames whose props turn the other way.
    pub reverse_yaw: bool,
}

/// Drives every motor: stopped when `armed` is false, mixed otherwise.
/// Returns the pulse widths that were sent.
pub fn write_motors(
    sink: &mut dyn MotorOutput,
    armed: bool,
    throttle: FixedPoint,
    mut pid: Vector3,
    config: &OutputConfig,
) -> [u16; MOTOR_COUNT] {
    let pulses = if armed {
        if config.reverse_yaw {
            pid.z = -pid.z;
        }
        mix_quad_x(throttle, pid).map(|value| to_pulse_width(value, config.armed_min_pulse_us))
    } else {
        [MIN_MOTOR_PULSE_US; MOTOR_COUNT]
    };
    for (index, &pulse) in pulses.iter().enumerate() {
        sink.set_motor(index, pulse);
    }
    pulses
}
