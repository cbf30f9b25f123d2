use crate::control::{AxisPid, PidGains};
use crate::flight::edge::{Edge, EdgeDetector};
use crate::math::{FixedPoint, ZERO};
use crate::time::Timesliver;

/// Altitude hold: a PID on altitude whose output is added to the throttle.
///
/// Engaged either by its own checkbox or, for one iteration at a time, by
/// uncrashable mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AltitudeHold {
    target: FixedPoint,
    pid: AxisPid,
    switch: EdgeDetector,
}

impl Default for AltitudeHold {
    fn default() -> Self {
        Self::new()
    }
}

impl AltitudeHold {
    pub const fn new() -> Self {
        Self { target: ZERO, pid: AxisPid::altitude(), switch: EdgeDetector::new() }
    }

    /// Follows the altitude-hold checkbox. On the rising edge the current
    /// altitude becomes the target and the integrator starts from zero.
    /// Returns whether the checkbox is on.
    pub fn update_switch(&mut self, on: bool, altitude: FixedPoint) -> bool {
        let edge = self.switch.update(on);
        if edge == Edge::Rising {
            self.target = altitude;
            self.pid.reset();
            info!("altitude hold engaged at {=f32} m", altitude.to_num::<f32>());
        }
        edge.is_active()
    }

    pub fn set_target(&mut self, target: FixedPoint) {
        self.target = target;
    }

    pub fn reset_integrator(&mut self) {
        self.pid.reset();
    }

    pub fn target(&self) -> FixedPoint {
        self.target
    }

    pub fn integrated_error(&self) -> FixedPoint {
        self.pid.integrated_error()
    }

    /// Throttle to add this iteration. Vertical velocity acts as the
    /// derivative term.
    pub fn throttle_correction(
        &mut self,
        altitude: FixedPoint,
        velocity: FixedPoint,
        timesliver: Timesliver,
        gains: &PidGains,
    ) -> FixedPoint {
        self.pid.update(self.target - altitude, velocity, timesliver, gains)
    }
}
