//! Compile-time tunables. Per-aircraft values live in
//! [`UserSettings`](crate::settings::UserSettings); these are fixed for the
//! firmware image.

use crate::math::{fp, fp_ratio, FixedPoint};

// ── Receiver ──────────────────────────────────────────────────────────────────

/// Throttle below this counts as "on the ground".
pub const STICK_LOW: FixedPoint = fp_ratio(-9, 10);
/// Aux channel positions are LOW below and HIGH above these.
pub const AUX_LOW_THRESHOLD: FixedPoint = fp_ratio(-1, 2);
pub const AUX_HIGH_THRESHOLD: FixedPoint = fp_ratio(1, 2);
/// Channel smoothing, one over the filter period in seconds.
pub const RX_FILTER_ONE_OVER_PERIOD: FixedPoint = fp(60);

// ── Stick commands ────────────────────────────────────────────────────────────

pub const STICK_MOVE_LOW: FixedPoint = fp_ratio(-2, 10);
pub const STICK_MOVE_HIGH: FixedPoint = fp_ratio(2, 10);
pub const STICK_COMMAND_TIMEOUT_US: u32 = 1_000_000;
/// Alternating roll-stick moves that trigger calibration.
pub const STICK_COMMAND_MOVES: u8 = 6;

// ── Failsafe ──────────────────────────────────────────────────────────────────

pub const FAILSAFE_TIMEOUT_US: u32 = 1_000_000;
/// Throttle held while the link is lost: a slow descent.
pub const FAILSAFE_THROTTLE: FixedPoint = fp_ratio(2, 10);

// ── Control law ───────────────────────────────────────────────────────────────

pub const INTEGRATED_ERROR_LIMIT: FixedPoint = fp(1000);
/// Attitude integrators bleed toward zero on the ground over this period (1/4 s).
pub const INTEGRAL_BLEED_ONE_OVER_PERIOD: FixedPoint = fp(4);
pub const ATTITUDE_INTEGRAL_SHIFT: u32 = 4;

/// Level-mode tilt limits in degrees.
pub const LEVEL_MAX_TILT: FixedPoint = fp(55);
pub const LEVEL_MAX_TILT_HIGH_ANGLE: FixedPoint = fp(80);
/// Stick deflection beyond which semi-acro switches an axis to rate mode.
pub const SEMI_ACRO_THRESHOLD: FixedPoint = fp_ratio(1, 2);
/// Cap on the accumulated rate error in acro and yaw-rate modes, degrees.
pub const MAX_RATE_MODE_ANGLE_ERROR: FixedPoint = fp(45);

// ── Throttle shaping ──────────────────────────────────────────────────────────

/// Throttle around which tilt compensation pivots.
pub const AUTOTHROTTLE_DEAD_AREA: FixedPoint = fp_ratio(1, 4);
/// No tilt compensation once the down vector's z drops below this.
pub const AUTOTHROTTLE_MIN_DOWN_Z: FixedPoint = fp_ratio(3, 10);

// ── Uncrashable mode ──────────────────────────────────────────────────────────

pub const UNCRASHABLE_LOOKAHEAD: FixedPoint = fp(1);
pub const UNCRASHABLE_RECOVERY_ANGLE: FixedPoint = fp(15);
/// Meters above the floor the aircraft may climb.
pub const UNCRASHABLE_MAX_ALTITUDE_OFFSET: FixedPoint = fp(30);
/// Meters from home before navigation takes over.
pub const UNCRASHABLE_RADIUS: FixedPoint = fp(50);
/// Down-vector z above which the aircraft counts as level enough to climb (~66°).
pub const UNCRASHABLE_LEVEL_DOWN_Z: FixedPoint = fp_ratio(4, 10);

// ── Navigation ────────────────────────────────────────────────────────────────

pub const MAX_NAVIGATION_TILT: FixedPoint = fp(20);
/// Position deltas are clamped to this many degrees before scaling to meters.
pub const NAVIGATION_MAX_DELTA_DEGREES: FixedPoint = fp_ratio(1, 4);
pub const MIN_NAVIGATION_SATELLITES: u8 = 5;

// ── Estimator ─────────────────────────────────────────────────────────────────

/// Accelerometer is trusted when its magnitude is within this many g of 1 g.
pub const ACC_TRUST_BAND: FixedPoint = fp_ratio(15, 100);
pub const ACC_TRUSTED_ONE_OVER_PERIOD: FixedPoint = fp(1);
pub const ACC_UNTRUSTED_ONE_OVER_PERIOD: FixedPoint = fp_ratio(1, 16);
pub const COMPASS_ONE_OVER_PERIOD: FixedPoint = fp_ratio(1, 2);
pub const BARO_ALTITUDE_ONE_OVER_PERIOD: FixedPoint = fp(1);
pub const BARO_VELOCITY_GAIN: FixedPoint = fp_ratio(1, 2);
pub const GRAVITY: FixedPoint = fp_ratio(980_665, 100_000);

// ── Outputs ───────────────────────────────────────────────────────────────────

pub const MIN_MOTOR_PULSE_US: u16 = 1000;
pub const MAX_MOTOR_PULSE_US: u16 = 2000;
pub const DEFAULT_ARMED_MIN_MOTOR_PULSE_US: u16 = 1067;
pub const DEFAULT_GAIN_SCHEDULING_FACTOR: FixedPoint = fp(1);

// ── Battery and status LEDs ───────────────────────────────────────────────────

pub const BATTERY_ONE_OVER_PERIOD: FixedPoint = fp(4);
pub const DEFAULT_BATTERY_UNDERVOLTAGE_LIMIT: FixedPoint = fp_ratio(35, 10);
pub const LED_BATTERY_PERIOD_US: u32 = 500_000;
pub const LED_BATTERY_ON_AFTER_US: u32 = 250_000;
pub const LED_FAILSAFE_PERIOD_US: u32 = 250_000;
pub const LED_FAILSAFE_SWAP_AFTER_US: u32 = 120_000;
pub const LED_DISARMED_PERIOD_US: u32 = 500_000;
pub const LED_DISARMED_ON_AFTER_US: u32 = 450_000;

// ── Calibration ───────────────────────────────────────────────────────────────

pub const CALIBRATION_SAMPLES: u32 = 64;
pub const CALIBRATION_INTERVAL_MS: u32 = 5;
