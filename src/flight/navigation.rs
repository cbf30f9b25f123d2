//! GPS navigation: return to home and position hold.
//!
//! Distances use a flat-earth approximation around the aircraft, good to a
//! fraction of a percent over the few hundred meters these modes cover.
//! Deltas are clamped to a quarter degree (~28 km) to stay inside fixed point.

use crate::config::{MAX_NAVIGATION_TILT, MIN_NAVIGATION_SATELLITES, NAVIGATION_MAX_DELTA_DEGREES};
use crate::control::{AxisPid, PidGains};
use crate::flight::checkbox::CheckboxItems;
use crate::math::{
    abs, atan2, constrain, cosine, fp, fp_ratio, multiply, shl, shr, sine, sqrt, Axis, FixedPoint,
    Vector3, ZERO,
};
use crate::sensors::{Coordinate, GpsFix};
use crate::time::Timesliver;

/// Meters per degree of latitude, divided by `2^Coordinate::EXTRA_SHIFT`.
const METERS_PER_SHIFTED_DEGREE: FixedPoint = fp_ratio(111_319, 1 << Coordinate::EXTRA_SHIFT);

/// Components are scaled below this before squaring.
const SQUARE_SAFE: FixedPoint = fp(64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NavigationMode {
    #[default]
    Off,
    ReturnToHome,
    PositionHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub latitude: Coordinate,
    pub longitude: Coordinate,
}

impl From<&GpsFix> for Position {
    fn from(fix: &GpsFix) -> Self {
        Self { latitude: fix.latitude, longitude: fix.longitude }
    }
}

/// North and east offsets in meters from `from` to `to`.
pub fn offset_meters(from: &Position, to: &Position) -> (FixedPoint, FixedPoint) {
    let limit = shl(NAVIGATION_MAX_DELTA_DEGREES, Coordinate::EXTRA_SHIFT);

    let mut north = to.latitude.raw() - from.latitude.raw();
    constrain(&mut north, -limit, limit);
    let mut east = to.longitude.raw() - from.longitude.raw();
    constrain(&mut east, -limit, limit);

    let north = multiply(north, METERS_PER_SHIFTED_DEGREE);
    let east = multiply(multiply(east, METERS_PER_SHIFTED_DEGREE), cosine(from.latitude.degrees()));
    (north, east)
}

/// Euclidean length of `(a, b)` without overflowing on large components.
fn length(a: FixedPoint, b: FixedPoint) -> FixedPoint {
    let (mut a, mut b, mut shift) = (a, b, 0);
    while abs(a) >= SQUARE_SAFE || abs(b) >= SQUARE_SAFE {
        a = shr(a, 1);
        b = shr(b, 1);
        shift += 1;
    }
    shl(sqrt(multiply(a, a) + multiply(b, b)), shift)
}

/// Distance in meters and bearing in degrees from north.
pub fn distance_and_bearing(from: &Position, to: &Position) -> (FixedPoint, FixedPoint) {
    let (north, east) = offset_meters(from, to);
    (length(north, east), atan2(east, north))
}

/// Earth-frame position error and ground velocity from the latest fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Track {
    north: FixedPoint,
    east: FixedPoint,
    velocity_north: FixedPoint,
    velocity_east: FixedPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigator {
    mode: NavigationMode,
    home: Option<Position>,
    current: Option<GpsFix>,
    destination: Position,
    track: Option<Track>,
    north_pid: AxisPid,
    east_pid: AxisPid,
    /// Roll and pitch the navigation PID last asked for.
    target_attitude: Vector3,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub const fn new() -> Self {
        Self {
            mode: NavigationMode::Off,
            home: None,
            current: None,
            destination: Position {
                latitude: Coordinate::from_degrees(ZERO),
                longitude: Coordinate::from_degrees(ZERO),
            },
            track: None,
            north_pid: AxisPid::navigation(),
            east_pid: AxisPid::navigation(),
            target_attitude: Vector3::ZERO,
        }
    }

    pub fn mode(&self) -> NavigationMode {
        self.mode
    }

    pub fn home(&self) -> Option<Position> {
        self.home
    }

    pub fn destination(&self) -> Position {
        self.destination
    }

    /// Latest usable fix, if the receiver has one.
    pub fn current_fix(&self) -> Option<&GpsFix> {
        self.current.as_ref()
    }

    /// Records a GPS fix; fixes with too few satellites are ignored.
    /// Returns whether the fix was accepted.
    pub fn gps_reading(&mut self, fix: &GpsFix) -> bool {
        if fix.satellites < MIN_NAVIGATION_SATELLITES {
            return false;
        }
        self.current = Some(*fix);
        true
    }

    pub fn set_home_to_current(&mut self) {
        if let Some(fix) = &self.current {
            self.home = Some(Position::from(fix));
            info!("home set");
        }
    }

    /// Points navigation at a new destination. The integrators start over.
    pub fn set_destination(&mut self, destination: Position) {
        self.destination = destination;
        self.track = None;
        self.north_pid.reset();
        self.east_pid.reset();
    }

    pub fn integrated_error(&self) -> (FixedPoint, FixedPoint) {
        (self.north_pid.integrated_error(), self.east_pid.integrated_error())
    }

    pub fn distance_from_home(&self) -> Option<FixedPoint> {
        let here = Position::from(self.current.as_ref()?);
        Some(distance_and_bearing(&here, &self.home?).0)
    }

    /// Engages or drops a navigation mode from the checkboxes. Returns
    /// `true` when navigation just handed control back to the pilot.
    pub fn update_mode(&mut self, items: CheckboxItems) -> bool {
        match self.mode {
            NavigationMode::Off => {
                let Some(fix) = self.current else {
                    return false;
                };
                if items.contains(CheckboxItems::RETURN_TO_HOME) {
                    if let Some(home) = self.home {
                        self.set_destination(home);
                        self.mode = NavigationMode::ReturnToHome;
                        info!("navigation: return to home");
                    }
                } else if items.contains(CheckboxItems::POSITION_HOLD) {
                    self.set_destination(Position::from(&fix));
                    self.mode = NavigationMode::PositionHold;
                    info!("navigation: position hold");
                }
                false
            }
            NavigationMode::ReturnToHome if !items.contains(CheckboxItems::RETURN_TO_HOME) => {
                self.mode = NavigationMode::Off;
                true
            }
            NavigationMode::PositionHold if !items.contains(CheckboxItems::POSITION_HOLD) => {
                self.mode = NavigationMode::Off;
                true
            }
            _ => false,
        }
    }

    /// Overwrites roll and pitch of `angle_error` so the aircraft tilts
    /// toward the destination.
    ///
    /// A new fix refreshes the position error; between fixes the last one
    /// keeps being integrated and the error against the current attitude is
    /// refreshed every call.
    pub fn steer(
        &mut self,
        new_reading: bool,
        timesliver: Timesliver,
        heading: FixedPoint,
        attitude: Vector3,
        gains: &PidGains,
        angle_error: &mut Vector3,
    ) {
        if new_reading {
            if let Some(fix) = self.current {
                self.track = Some(self.track_to_destination(&fix));
            }
        }
        if let Some(track) = self.track {
            self.target_attitude = self.target_tilt(&track, timesliver, heading, gains);
        }
        angle_error[Axis::Roll] = self.target_attitude.roll() - attitude.roll();
        angle_error[Axis::Pitch] = self.target_attitude.pitch() - attitude.pitch();
    }

    fn track_to_destination(&self, fix: &GpsFix) -> Track {
        let (north, east) = offset_meters(&Position::from(fix), &self.destination);
        Track {
            north,
            east,
            velocity_north: multiply(fix.ground_speed, cosine(fix.course)),
            velocity_east: multiply(fix.ground_speed, sine(fix.course)),
        }
    }

    fn target_tilt(
        &mut self,
        track: &Track,
        timesliver: Timesliver,
        heading: FixedPoint,
        gains: &PidGains,
    ) -> Vector3 {
        // Desired tilt in the earth frame, degrees toward north and east.
        let mut tilt_north = self.north_pid.update(track.north, track.velocity_north, timesliver, gains);
        let mut tilt_east = self.east_pid.update(track.east, track.velocity_east, timesliver, gains);
        constrain(&mut tilt_north, -MAX_NAVIGATION_TILT, MAX_NAVIGATION_TILT);
        constrain(&mut tilt_east, -MAX_NAVIGATION_TILT, MAX_NAVIGATION_TILT);

        let (sin_heading, cos_heading) = (sine(heading), cosine(heading));
        let forward = multiply(tilt_north, cos_heading) + multiply(tilt_east, sin_heading);
        let right = multiply(tilt_east, cos_heading) - multiply(tilt_north, sin_heading);

        // Nose down to move forward, right wing down to move right.
        Vector3::new(right, -forward, ZERO)
    }

    pub fn target_attitude(&self) -> Vector3 {
        self.target_attitude
    }
}
