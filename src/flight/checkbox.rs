//! Checkboxes: pilot-configurable mode switches driven by the aux channels.
//!
//! Each aux channel reads as LOW, MID or HIGH. A checkbox is configured with
//! the set of aux positions that turn it on and is active whenever any of
//! them is current.

use bitflags::bitflags;

use crate::config::{AUX_HIGH_THRESHOLD, AUX_LOW_THRESHOLD};
use crate::receiver::{Channel, RxChannels};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Checkbox {
    Arm = 0,
    AltitudeHold = 1,
    Uncrashable = 2,
    ReturnToHome = 3,
    PositionHold = 4,
    AutoThrottle = 5,
    HighAngle = 6,
    FullAcro = 7,
    SemiAcro = 8,
    HighRates = 9,
    YawHold = 10,
}

pub const CHECKBOX_COUNT: usize = 11;

impl Checkbox {
    pub const ALL: [Checkbox; CHECKBOX_COUNT] = [
        Checkbox::Arm,
        Checkbox::AltitudeHold,
        Checkbox::Uncrashable,
        Checkbox::ReturnToHome,
        Checkbox::PositionHold,
        Checkbox::AutoThrottle,
        Checkbox::HighAngle,
        Checkbox::FullAcro,
        Checkbox::SemiAcro,
        Checkbox::HighRates,
        Checkbox::YawHold,
    ];

    pub const fn item(self) -> CheckboxItems {
        CheckboxItems::from_bits_retain(1 << self as u16)
    }
}

bitflags! {
    /// Set of active checkboxes, one bit per [`Checkbox`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CheckboxItems: u16 {
        const ARM = 1 << 0;
        const ALT_HOLD = 1 << 1;
        const UNCRASHABLE = 1 << 2;
        const RETURN_TO_HOME = 1 << 3;
        const POSITION_HOLD = 1 << 4;
        const AUTO_THROTTLE = 1 << 5;
        const HIGH_ANGLE = 1 << 6;
        const FULL_ACRO = 1 << 7;
        const SEMI_ACRO = 1 << 8;
        const HIGH_RATES = 1 << 9;
        const YAW_HOLD = 1 << 10;
    }
}

bitflags! {
    /// Aux switch positions, three bits per aux channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AuxSwitchMask: u16 {
        const AUX1_LOW = 1 << 0;
        const AUX1_MID = 1 << 1;
        const AUX1_HIGH = 1 << 2;
        const AUX2_LOW = 1 << 3;
        const AUX2_MID = 1 << 4;
        const AUX2_HIGH = 1 << 5;
        const AUX3_LOW = 1 << 6;
        const AUX3_MID = 1 << 7;
        const AUX3_HIGH = 1 << 8;
        const AUX4_LOW = 1 << 9;
        const AUX4_MID = 1 << 10;
        const AUX4_HIGH = 1 << 11;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CheckboxItems {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "CheckboxItems({=u16:#x})", self.bits())
    }
}

/// Current position of every aux switch.
pub fn aux_positions(rx: &RxChannels) -> AuxSwitchMask {
    let mut mask = AuxSwitchMask::empty();
    for (index, channel) in Channel::AUX.iter().enumerate() {
        let value = rx.get(*channel);
        let position = if value < AUX_LOW_THRESHOLD {
            0
        } else if value > AUX_HIGH_THRESHOLD {
            2
        } else {
            1
        };
        mask |= AuxSwitchMask::from_bits_retain(1 << (index * 3 + position));
    }
    mask
}

/// Which aux positions turn on each checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckboxConfig([AuxSwitchMask; CHECKBOX_COUNT]);

impl CheckboxConfig {
    pub const fn none() -> Self {
        Self([AuxSwitchMask::empty(); CHECKBOX_COUNT])
    }

    pub fn get(&self, checkbox: Checkbox) -> AuxSwitchMask {
        self.0[checkbox as usize]
    }

    pub fn set(&mut self, checkbox: Checkbox, mask: AuxSwitchMask) -> &mut Self {
        self.0[checkbox as usize] = mask;
        self
    }

    pub fn active_items(&self, positions: AuxSwitchMask) -> CheckboxItems {
        Checkbox::ALL
            .iter()
            .filter(|&&checkbox| self.get(checkbox).intersects(positions))
            .fold(CheckboxItems::empty(), |items, &checkbox| items | checkbox.item())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Checkbox, AuxSwitchMask)> + '_ {
        Checkbox::ALL.iter().map(move |&checkbox| (checkbox, self.get(checkbox)))
    }
}

impl Default for CheckboxConfig {
    /// Aux 1 low gives the steeper level mode, aux 1 high semi-acro with high
    /// rates, aux 2 high arms.
    fn default() -> Self {
        let mut config = Self::none();
        config
            .set(Checkbox::Arm, AuxSwitchMask::AUX2_HIGH)
            .set(Checkbox::HighAngle, AuxSwitchMask::AUX1_LOW)
            .set(Checkbox::SemiAcro, AuxSwitchMask::AUX1_HIGH)
            .set(Checkbox::HighRates, AuxSwitchMask::AUX1_HIGH);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{fp, fp_ratio, FixedPoint};
    use crate::receiver::RxFrame;

    fn aux(values: [FixedPoint; 4]) -> RxChannels {
        let mut frame = RxFrame::default();
        for (channel, value) in Channel::AUX.iter().zip(values) {
            frame.set(*channel, value);
        }
        let mut rx = RxChannels::default();
        rx.set_all(&frame);
        rx
    }

    #[test]
    fn checkbox_bits_line_up() {
        for (index, checkbox) in Checkbox::ALL.iter().enumerate() {
            assert_eq!(*checkbox as usize, index);
        }
        assert_eq!(Checkbox::YawHold.item(), CheckboxItems::YAW_HOLD);
        assert_eq!(Checkbox::Arm.item(), CheckboxItems::ARM);
    }

    #[test]
    fn aux_channels_classify_into_three_positions() {
        let rx = aux([fp(-1), fp(0), fp(1), fp_ratio(1, 2)]);
        assert_eq!(
            aux_positions(&rx),
            AuxSwitchMask::AUX1_LOW | AuxSwitchMask::AUX2_MID | AuxSwitchMask::AUX3_HIGH | AuxSwitchMask::AUX4_MID
        );
    }

    #[test]
    fn default_configuration() {
        let config = CheckboxConfig::default();
        let low = config.active_items(aux_positions(&aux([fp(-1), fp(-1), fp(-1), fp(-1)])));
        assert_eq!(low, CheckboxItems::HIGH_ANGLE);

        let high = config.active_items(aux_positions(&aux([fp(1), fp(1), fp(-1), fp(-1)])));
        assert_eq!(high, CheckboxItems::ARM | CheckboxItems::SEMI_ACRO | CheckboxItems::HIGH_RATES);
    }

    #[test]
    fn any_configured_position_activates() {
        let mut config = CheckboxConfig::none();
        config.set(Checkbox::AltitudeHold, AuxSwitchMask::AUX3_MID | AuxSwitchMask::AUX3_HIGH);
        let mid = config.active_items(aux_positions(&aux([fp(0), fp(0), fp(0), fp(0)])));
        assert_eq!(mid, CheckboxItems::ALT_HOLD);
        let low = config.active_items(aux_positions(&aux([fp(0), fp(0), fp(-1), fp(0)])));
        assert!(low.is_empty());
    }
}
