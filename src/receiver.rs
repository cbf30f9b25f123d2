//! Radio input: logical channel layout, the receiver capability and the
//! smoothed channel values the rest of the loop reads.

use crate::config::RX_FILTER_ONE_OVER_PERIOD;
use crate::math::{constrain, fp_ratio, low_pass_filter, FixedPoint, ONE};
use crate::time::Timesliver;

pub const CHANNEL_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Throttle = 0,
    Roll = 1,
    Pitch = 2,
    Yaw = 3,
    Aux1 = 4,
    Aux2 = 5,
    Aux3 = 6,
    Aux4 = 7,
}

impl Channel {
    pub const AUX: [Channel; 4] = [Channel::Aux1, Channel::Aux2, Channel::Aux3, Channel::Aux4];
}

/// One decoded frame, each channel normalized to roughly `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxFrame {
    pub channels: [FixedPoint; CHANNEL_COUNT],
}

impl RxFrame {
    pub fn get(&self, channel: Channel) -> FixedPoint {
        self.channels[channel as usize]
    }

    pub fn set(&mut self, channel: Channel, value: FixedPoint) {
        self.channels[channel as usize] = value;
    }
}

/// Anything that decodes pilot input: a radio protocol, a serial link, a
/// test script. Polled once per loop iteration; never blocks.
pub trait Receiver {
    /// Returns a frame only when a new valid one has been decoded since the
    /// previous poll.
    fn poll(&mut self) -> Option<RxFrame>;
}

/// Microseconds per unit of stick travel for servo-style pulse widths.
const PULSE_HALF_RANGE_US: i32 = 500;
const PULSE_CENTER_US: i32 = 1500;

/// Maps a 1000–2000 µs pulse onto `[-1, 1]`, centered at 1500 µs.
pub fn from_pulse_width(pulse_us: u16) -> FixedPoint {
    let mut value = fp_ratio(pulse_us as i32 - PULSE_CENTER_US, PULSE_HALF_RANGE_US);
    constrain(&mut value, -ONE, ONE);
    value
}

/// Channel values as the control loop sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxChannels {
    values: [FixedPoint; CHANNEL_COUNT],
}

impl RxChannels {
    pub fn get(&self, channel: Channel) -> FixedPoint {
        self.values[channel as usize]
    }

    pub fn throttle(&self) -> FixedPoint {
        self.get(Channel::Throttle)
    }

    /// Pulls every channel toward `frame` with a short low-pass so a single
    /// glitched frame cannot kick the sticks. Throttle is kept in `[-1, 1]`.
    pub fn smooth_toward(&mut self, frame: &RxFrame, timesliver: Timesliver) {
        for (value, &target) in self.values.iter_mut().zip(frame.channels.iter()) {
            low_pass_filter(
                value,
                target,
                timesliver.raw(),
                RX_FILTER_ONE_OVER_PERIOD,
                Timesliver::EXTRA_SHIFT,
            );
        }
        constrain(&mut self.values[Channel::Throttle as usize], -ONE, ONE);
    }

    /// Overwrites every channel at once. Used by tests and by a link that
    /// already filters.
    pub fn set_all(&mut self, frame: &RxFrame) {
        self.values = frame.channels;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RxChannels {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "T {} R {} P {} Y {}",
            self.get(Channel::Throttle).to_num::<f32>(),
            self.get(Channel::Roll).to_num::<f32>(),
            self.get(Channel::Pitch).to_num::<f32>(),
            self.get(Channel::Yaw).to_num::<f32>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{fp, fp_ratio};

    #[test]
    fn pulse_widths_normalize() {
        assert_eq!(from_pulse_width(1500), fp(0));
        assert_eq!(from_pulse_width(2000), fp(1));
        assert_eq!(from_pulse_width(1000), fp(-1));
        assert_eq!(from_pulse_width(1750), fp_ratio(1, 2));
        assert_eq!(from_pulse_width(2200), fp(1));
        assert_eq!(from_pulse_width(800), fp(-1));
    }

    #[test]
    fn smoothing_reaches_a_held_stick() {
        let mut frame = RxFrame::default();
        frame.set(Channel::Roll, fp_ratio(3, 4));
        frame.set(Channel::Throttle, fp(1));
        let mut rx = RxChannels::default();
        let ts = Timesliver::from_micros(2_000);

        rx.smooth_toward(&frame, ts);
        let first = rx.get(Channel::Roll);
        assert!(first > fp(0) && first < fp_ratio(3, 4));

        for _ in 0..2_000 {
            rx.smooth_toward(&frame, ts);
        }
        assert_eq!(rx.get(Channel::Roll), fp_ratio(3, 4));
        assert_eq!(rx.throttle(), fp(1));
    }

    #[test]
    fn throttle_is_clamped() {
        let mut frame = RxFrame::default();
        frame.set(Channel::Throttle, fp(3));
        let mut rx = RxChannels::default();
        for _ in 0..1_000 {
            rx.smooth_toward(&frame, Timesliver::MAX);
        }
        assert_eq!(rx.throttle(), fp(1));
    }
}
