//! Control law: stick interpretation, PID and the output mixer.

pub mod mixer;
pub mod pid;
pub mod pilot;

pub use mixer::{mix_quad_x, to_pulse_width, write_motors, MotorOutput, OutputConfig, MOTOR_COUNT};
pub use pid::{gain_schedule_multiplier, AxisPid, PidAxis, PidGains};
pub use pilot::{PilotControl, RateLimits};
