//! Uncrashable mode: keeps the aircraft between a floor and a ceiling and,
//! with a GPS, inside a circle around the point where it was switched on.

use crate::config::{
    UNCRASHABLE_LEVEL_DOWN_Z, UNCRASHABLE_LOOKAHEAD, UNCRASHABLE_MAX_ALTITUDE_OFFSET,
    UNCRASHABLE_RADIUS, UNCRASHABLE_RECOVERY_ANGLE,
};
use crate::control::PidGains;
use crate::flight::althold::AltitudeHold;
use crate::flight::edge::{Edge, EdgeDetector};
use crate::flight::navigation::Navigator;
use crate::math::{constrain, multiply, Axis, FixedPoint, Vector3, ZERO};
use crate::time::Timesliver;

/// What the altitude guard did this iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AltitudeGuard {
    /// Between floor and ceiling; the pilot flies.
    Clear,
    /// Heading above the ceiling; altitude hold pulls back down to it.
    Ceiling,
    /// Heading below the floor and level enough to climb.
    Recovering,
    /// Heading below the floor but too tilted to climb; throttle cut.
    Leveling,
}

impl AltitudeGuard {
    /// Whether altitude hold must run this iteration.
    pub fn holds_altitude(self) -> bool {
        matches!(self, AltitudeGuard::Ceiling | AltitudeGuard::Recovering)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Uncrashable {
    switch: EdgeDetector,
    floor: FixedPoint,
    recovery_altitude: FixedPoint,
    recovering: bool,
    navigating: bool,
}

impl Uncrashable {
    pub const fn new() -> Self {
        Self {
            switch: EdgeDetector::new(),
            floor: ZERO,
            recovery_altitude: ZERO,
            recovering: false,
            navigating: false,
        }
    }

    /// Follows the uncrashable checkbox. Switching on makes the current
    /// altitude the floor and the current position home. Returns whether
    /// the mode is on.
    pub fn update_switch(&mut self, on: bool, altitude: FixedPoint, navigator: &mut Navigator) -> bool {
        let edge = self.switch.update(on);
        match edge {
            Edge::Rising => {
                self.floor = altitude;
                self.navigating = false;
                navigator.set_home_to_current();
                info!("uncrashable on, floor {=f32} m", altitude.to_num::<f32>());
            }
            Edge::Falling | Edge::Low => self.navigating = false,
            Edge::High => {}
        }
        edge.is_active()
    }

    pub fn floor(&self) -> FixedPoint {
        self.floor
    }

    pub fn ceiling(&self) -> FixedPoint {
        self.floor + UNCRASHABLE_MAX_ALTITUDE_OFFSET
    }

    pub fn is_navigating(&self) -> bool {
        self.navigating
    }

    /// Projects the altitude one lookahead ahead and steps in when it would
    /// leave the band between floor and ceiling.
    ///
    /// Below the floor the pilot's roll and pitch are limited to the
    /// recovery angle and the throttle is cut until the aircraft is level
    /// enough to climb back.
    #[allow(clippy::too_many_arguments)]
    pub fn guard_altitude(
        &mut self,
        altitude: FixedPoint,
        velocity: FixedPoint,
        down_z: FixedPoint,
        attitude: Vector3,
        hold: &mut AltitudeHold,
        throttle: &mut FixedPoint,
        angle_error: &mut Vector3,
    ) -> AltitudeGuard {
        let projected = altitude + multiply(velocity, UNCRASHABLE_LOOKAHEAD);

        if projected > self.ceiling() {
            hold.set_target(self.ceiling());
            hold.reset_integrator();
            return AltitudeGuard::Ceiling;
        }

        if projected >= self.floor {
            self.recovering = false;
            return AltitudeGuard::Clear;
        }

        if !self.recovering {
            self.recovery_altitude = altitude;
            hold.reset_integrator();
            self.recovering = true;
            warn!("uncrashable: below floor, recovering");
        }

        for axis in [Axis::Roll, Axis::Pitch] {
            constrain(
                &mut angle_error[axis],
                -UNCRASHABLE_RECOVERY_ANGLE - attitude[axis],
                UNCRASHABLE_RECOVERY_ANGLE - attitude[axis],
            );
        }

        if down_z > UNCRASHABLE_LEVEL_DOWN_Z {
            hold.set_target(self.recovery_altitude);
            AltitudeGuard::Recovering
        } else {
            *throttle = ZERO;
            AltitudeGuard::Leveling
        }
    }

    /// Navigates back home whenever the aircraft is farther out than the
    /// allowed radius. Returns whether navigation took over.
    pub fn guard_position(
        &mut self,
        navigator: &mut Navigator,
        new_reading: bool,
        timesliver: Timesliver,
        heading: FixedPoint,
        attitude: Vector3,
        gains: &PidGains,
        angle_error: &mut Vector3,
    ) -> bool {
        let outside = navigator.distance_from_home().is_some_and(|d| d > UNCRASHABLE_RADIUS);
        if !outside {
            self.navigating = false;
            return false;
        }
        if !self.navigating {
            if let Some(home) = navigator.home() {
                navigator.set_destination(home);
            }
            self.navigating = true;
            warn!("uncrashable: outside radius, heading home");
        }
        navigator.steer(new_reading, timesliver, heading, attitude, gains, angle_error);
        true
    }
}
