use crate::config::{FAILSAFE_THROTTLE, FAILSAFE_TIMEOUT_US};
use crate::math::{Axis, FixedPoint, Vector3};
use crate::time::Timer;

/// Receiver watchdog. Restarted by every valid frame; once it runs past
/// the timeout the aircraft descends level until the link comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Failsafe {
    last_frame: Timer,
    active: bool,
}

impl Failsafe {
    pub const fn new(now: u32) -> Self {
        Self { last_frame: Timer::at(now), active: false }
    }

    pub fn frame_received(&mut self, now: u32) {
        self.last_frame = Timer::at(now);
    }

    /// Re-evaluates the watchdog. Returns whether failsafe is active.
    pub fn update(&mut self, now: u32) -> bool {
        let silent_for = self.last_frame.elapsed_at(now);
        let active = silent_for > FAILSAFE_TIMEOUT_US;
        if active != self.active {
            if active {
                warn!("receiver silent for {=u32} us, failsafe engaged", silent_for);
            } else {
                info!("receiver back, failsafe cleared");
            }
            self.active = active;
        }
        active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Replaces the pilot's throttle with the descent value and commands
    /// roll and pitch back to level.
    pub fn override_controls(&self, throttle: &mut FixedPoint, angle_error: &mut Vector3, attitude: Vector3) {
        if !self.active {
            return;
        }
        *throttle = FAILSAFE_THROTTLE;
        angle_error[Axis::Roll] = -attitude[Axis::Roll];
        angle_error[Axis::Pitch] = -attitude[Axis::Pitch];
    }
}
