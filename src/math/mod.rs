//! Deterministic fixed-point arithmetic for the control path.
//!
//! Every value is an [`I16F16`]: a signed 32-bit integer with 16 fractional
//! bits. The routines below work on the raw bits so results are identical on
//! every target, with or without an FPU.

mod ops;
mod parse;
mod sqrt;
mod trig;
mod vector;

use fixed::types::I16F16;

pub use ops::{constrain, constrain180, low_pass_filter, multiply, multiply_raw};
pub use parse::{string_to_fixed_point, string_to_long};
pub use sqrt::{inv_sqrt, sqrt};
pub use trig::{atan2, cosine, sine};
pub use vector::{Axis, Vector3};

pub type FixedPoint = I16F16;

pub const FIXED_POINT_SHIFT: u32 = 16;

/// Fixed-point constant from an integer.
pub const fn fp(n: i32) -> FixedPoint {
    FixedPoint::from_bits(n << FIXED_POINT_SHIFT)
}

/// Fixed-point constant from a ratio, truncated toward zero.
pub const fn fp_ratio(numerator: i32, denominator: i32) -> FixedPoint {
    FixedPoint::from_bits((((numerator as i64) << FIXED_POINT_SHIFT) / denominator as i64) as i32)
}

pub const ZERO: FixedPoint = FixedPoint::ZERO;
pub const ONE: FixedPoint = fp(1);
pub const HALF: FixedPoint = fp_ratio(1, 2);
pub const THREE: FixedPoint = fp(3);
pub const DEG_45: FixedPoint = fp(45);
pub const DEG_90: FixedPoint = fp(90);
pub const DEG_180: FixedPoint = fp(180);
pub const DEG_360: FixedPoint = fp(360);

/// π/180, for turning degrees into radians.
pub const DEG_TO_RAD: FixedPoint = FixedPoint::from_bits(1144);

/// Arithmetic shift right on the raw bits.
#[inline]
pub const fn shr(value: FixedPoint, bits: u32) -> FixedPoint {
    FixedPoint::from_bits(value.to_bits() >> bits)
}

/// Shift left on the raw bits, wrapping like the underlying integer.
#[inline]
pub const fn shl(value: FixedPoint, bits: u32) -> FixedPoint {
    FixedPoint::from_bits(value.to_bits().wrapping_shl(bits))
}

/// Absolute value, saturating at the most negative value.
#[inline]
pub const fn abs(value: FixedPoint) -> FixedPoint {
    FixedPoint::from_bits(value.to_bits().saturating_abs())
}
