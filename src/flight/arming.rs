use crate::config::STICK_LOW;
use crate::math::{FixedPoint, ZERO};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmingEvent {
    Armed,
    Disarmed,
}

/// Arm state plus the references captured at the moment of arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArmingState {
    armed: bool,
    heading_when_armed: FixedPoint,
    altitude_when_armed: FixedPoint,
}

impl ArmingState {
    pub const fn new() -> Self {
        Self { armed: false, heading_when_armed: ZERO, altitude_when_armed: ZERO }
    }

    /// Arms or disarms following the arm switch, but only while the throttle
    /// is on the stop. With the throttle up nothing changes in either
    /// direction, so a bumped switch can neither spin the motors up nor drop
    /// the aircraft.
    pub fn update(
        &mut self,
        arm_switch: bool,
        throttle: FixedPoint,
        heading: FixedPoint,
        altitude: FixedPoint,
    ) -> Option<ArmingEvent> {
        if throttle >= STICK_LOW {
            return None;
        }
        match (self.armed, arm_switch) {
            (false, true) => {
                self.armed = true;
                self.heading_when_armed = heading;
                self.altitude_when_armed = altitude;
                info!("armed");
                Some(ArmingEvent::Armed)
            }
            (true, false) => {
                self.armed = false;
                info!("disarmed");
                Some(ArmingEvent::Disarmed)
            }
            _ => None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn heading_when_armed(&self) -> FixedPoint {
        self.heading_when_armed
    }

    pub fn altitude_when_armed(&self) -> FixedPoint {
        self.altitude_when_armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{fp, fp_ratio};

    const LOW: FixedPoint = fp(-1);
    const CRUISE: FixedPoint = fp_ratio(1, 5);

    #[test]
    fn arming_is_denied_with_throttle_up() {
        let mut arming = ArmingState::new();
        assert_eq!(arming.update(true, CRUISE, fp(10), fp(3)), None);
        assert!(!arming.is_armed());
        assert_eq!(arming.update(true, STICK_LOW, fp(10), fp(3)), None);
        assert!(!arming.is_armed());
    }

    #[test]
    fn arming_captures_references() {
        let mut arming = ArmingState::new();
        assert_eq!(arming.update(true, LOW, fp(42), fp(-7)), Some(ArmingEvent::Armed));
        assert!(arming.is_armed());
        assert_eq!(arming.heading_when_armed(), fp(42));
        assert_eq!(arming.altitude_when_armed(), fp(-7));
        assert_eq!(arming.update(true, LOW, fp(50), fp(0)), None);
        assert_eq!(arming.heading_when_armed(), fp(42));
    }

    #[test]
    fn disarming_waits_for_low_throttle() {
        let mut arming = ArmingState::new();
        arming.update(true, LOW, ZERO, ZERO);
        assert_eq!(arming.update(false, CRUISE, ZERO, ZERO), None);
        assert!(arming.is_armed());
        assert_eq!(arming.update(false, LOW, ZERO, ZERO), Some(ArmingEvent::Disarmed));
        assert!(!arming.is_armed());
    }
}
