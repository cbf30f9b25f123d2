use super::{shl, shr, FixedPoint, DEG_180, DEG_360, FIXED_POINT_SHIFT, ONE};

/// Raw fixed-point product, `(x * y) >> 16` without a 64-bit intermediate.
///
/// The operands are split into signed high and unsigned low halves. The sum of
/// the partial products equals the wide product floored at the binary point,
/// wrapping in 32 bits exactly like the wide result would when truncated.
#[inline]
pub const fn multiply_raw(x: i32, y: i32) -> i32 {
    let xh = x >> FIXED_POINT_SHIFT;
    let xl = (x & 0xffff) as u32;
    let yh = y >> FIXED_POINT_SHIFT;
    let yl = (y & 0xffff) as u32;

    (xh.wrapping_mul(yh) << FIXED_POINT_SHIFT)
        .wrapping_add(xh.wrapping_mul(yl as i32))
        .wrapping_add(yh.wrapping_mul(xl as i32))
        .wrapping_add(((xl * yl) >> FIXED_POINT_SHIFT) as i32)
}

#[inline]
pub const fn multiply(a: FixedPoint, b: FixedPoint) -> FixedPoint {
    FixedPoint::from_bits(multiply_raw(a.to_bits(), b.to_bits()))
}

/// Clamps `value` into `[low, high]` in place.
#[inline]
pub fn constrain(value: &mut FixedPoint, low: FixedPoint, high: FixedPoint) {
    debug_assert!(low <= high);
    if *value < low {
        *value = low;
    } else if *value > high {
        *value = high;
    }
}

/// Wraps an angle in degrees into (-180, 180].
pub fn constrain180(angle: &mut FixedPoint) {
    while *angle <= -DEG_180 {
        *angle += DEG_360;
    }
    while *angle > DEG_180 {
        *angle -= DEG_360;
    }
}

/// Single-pole low-pass update.
///
/// `fraction = timesliver * one_over_period` is the share of the new value
/// blended in this step. `timesliver` may carry `extra_shift` additional
/// fractional bits; the blend is computed at that precision and shifted back.
/// The final ±1 step toward `new_value` keeps truncation from parking the
/// filter one unit short of its target.
pub fn low_pass_filter(
    variable: &mut FixedPoint,
    new_value: FixedPoint,
    timesliver: FixedPoint,
    one_over_period: FixedPoint,
    extra_shift: u32,
) {
    let full = shl(ONE, extra_shift);
    let mut fraction = multiply(timesliver, one_over_period);
    constrain(&mut fraction, FixedPoint::ZERO, full);

    let blended = multiply(fraction, new_value).wrapping_add(multiply(full - fraction, *variable));
    *variable = shr(blended, extra_shift);

    if new_value > *variable {
        *variable += FixedPoint::DELTA;
    } else if new_value < *variable {
        *variable -= FixedPoint::DELTA;
    }
}
