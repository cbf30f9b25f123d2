use super::{constrain180, multiply_raw, FixedPoint, DEG_180, DEG_360, DEG_45, DEG_90};

// Sine and cosine of 0°, 8°, ... 88° in raw fixed point.
const SINE_TABLE: [i32; 12] = [
    0, 9121, 18064, 26656, 34729, 42126, 48703, 54332, 58903, 62328, 64540, 65496,
];
const COSINE_TABLE: [i32; 12] = [
    65536, 64898, 62997, 59870, 55578, 50203, 43852, 36647, 28729, 20252, 11380, 2287,
];

// atan(2^-i) in degrees, raw fixed point.
const ATAN_TABLE: [i32; 13] = [
    2949120, 1740967, 919879, 466945, 234379, 117304, 58666, 29335, 14668, 7334, 3667, 1833,
    917,
];

/// Rotation steps after octant reduction. Each extra step halves the
/// residual angle at the cost of two shifts and three adds.
const CORDIC_ITERATIONS: usize = 10;

/// Largest magnitude fed to the CORDIC loop. Keeps `x + y` and the CORDIC
/// gain of ~1.65 inside 32 bits.
const CORDIC_INPUT_LIMIT: i32 = 1 << 29;

/// Sine of an angle in degrees.
///
/// Reduced to [0°, 90°], looked up at 8° steps and corrected linearly for the
/// remainder with `sin(a + b) ≈ sin(a) + cos(a)·b`.
pub fn sine(angle: FixedPoint) -> FixedPoint {
    let mut angle = angle.to_bits();
    let (half_turn, full_turn, quarter_turn) =
        (DEG_180.to_bits(), DEG_360.to_bits(), DEG_90.to_bits());

    while angle > half_turn {
        angle -= full_turn;
    }
    while angle < -half_turn {
        angle += full_turn;
    }

    let negate = angle < 0;
    if negate {
        angle = -angle;
    }
    if angle > quarter_turn {
        angle = half_turn - angle;
    }

    let big = (angle >> (3 + 16)) as usize;
    let small = angle - ((big as i32) << (3 + 16));
    // 143 / 2^13 ≈ π/180
    let small_radians = (small * 143) >> 13;

    let result = multiply_raw(COSINE_TABLE[big], small_radians) + SINE_TABLE[big];
    FixedPoint::from_bits(if negate { -result } else { result })
}

pub fn cosine(angle: FixedPoint) -> FixedPoint {
    let mut angle = angle;
    constrain180(&mut angle);
    sine(angle + DEG_90)
}

/// Angle of the vector `(x, y)` in degrees, in (-180, 180].
///
/// Vectoring-mode CORDIC: the vector is first rotated into the first octant
/// and then driven onto the x axis with shift-and-add rotations while the
/// applied angles are summed. No division is involved.
pub fn atan2(y: FixedPoint, x: FixedPoint) -> FixedPoint {
    let (mut y, mut x) = (y.to_bits(), x.to_bits());

    if y == 0 {
        return if x >= 0 { FixedPoint::ZERO } else { DEG_180 };
    }

    while x.unsigned_abs() >= CORDIC_INPUT_LIMIT as u32 || y.unsigned_abs() >= CORDIC_INPUT_LIMIT as u32 {
        x >>= 1;
        y >>= 1;
    }

    let mut result: i32 = 0;

    if y < 0 {
        x = -x;
        y = -y;
        result -= DEG_180.to_bits();
    }
    if x <= 0 {
        let tmp = x;
        x = y;
        y = -tmp;
        result += DEG_90.to_bits();
    }
    if x <= y {
        let tmp = y - x;
        x += y;
        y = tmp;
        result += DEG_45.to_bits();
    }
    if x < 0x10000 {
        x *= 0x1000;
        y *= 0x1000;
    }

    for (i, step) in ATAN_TABLE.iter().enumerate().skip(1).take(CORDIC_ITERATIONS) {
        if y >= 0 {
            let tmp = x + (y >> i);
            y -= x >> i;
            x = tmp;
            result += step;
        } else {
            let tmp = x - (y >> i);
            y += x >> i;
            x = tmp;
            result -= step;
        }
    }

    let mut angle = FixedPoint::from_bits(result);
    constrain180(&mut angle);
    angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fp;
    use approx::assert_abs_diff_eq;

    fn as_f64(v: FixedPoint) -> f64 {
        v.to_num::<f64>()
    }

    fn angle_difference(a: f64, b: f64) -> f64 {
        let mut d = a - b;
        while d > 180.0 {
            d -= 360.0;
        }
        while d <= -180.0 {
            d += 360.0;
        }
        d
    }

    #[test]
    fn sine_and_cosine_track_libm() {
        for degrees in -720..=720 {
            let angle = fp(degrees);
            let radians = (degrees as f64).to_radians();
            assert_abs_diff_eq!(as_f64(sine(angle)), radians.sin(), epsilon = 0.012);
            assert_abs_diff_eq!(as_f64(cosine(angle)), radians.cos(), epsilon = 0.012);
        }
    }

    #[test]
    fn sine_cardinal_points() {
        assert_eq!(sine(fp(0)), FixedPoint::ZERO);
        assert_abs_diff_eq!(as_f64(sine(fp(90))), 1.0, epsilon = 0.001);
        assert_abs_diff_eq!(as_f64(sine(fp(-90))), -1.0, epsilon = 0.001);
        assert_abs_diff_eq!(as_f64(cosine(fp(180))), -1.0, epsilon = 0.001);
    }

    #[test]
    fn atan2_special_cases() {
        assert_eq!(atan2(FixedPoint::ZERO, fp(1)), FixedPoint::ZERO);
        assert_eq!(atan2(FixedPoint::ZERO, FixedPoint::ZERO), FixedPoint::ZERO);
        assert_eq!(atan2(FixedPoint::ZERO, fp(-1)), DEG_180);
        assert_abs_diff_eq!(as_f64(atan2(fp(1), fp(0))), 90.0, epsilon = 0.1);
        assert_abs_diff_eq!(as_f64(atan2(fp(-1), fp(0))), -90.0, epsilon = 0.1);
        assert_abs_diff_eq!(as_f64(atan2(fp(1), fp(1))), 45.0, epsilon = 0.1);
        assert_abs_diff_eq!(as_f64(atan2(fp(-1), fp(-1))), -135.0, epsilon = 0.1);
    }

    #[test]
    fn atan2_handles_large_operands() {
        assert_abs_diff_eq!(as_f64(atan2(fp(20_000), fp(20_000))), 45.0, epsilon = 0.1);
        assert_abs_diff_eq!(as_f64(atan2(fp(-30_000), fp(10))), -89.98, epsilon = 0.1);
    }

    #[test]
    fn atan2_of_sine_and_cosine_round_trips() {
        let mut tenths = -1800;
        while tenths < 1800 {
            let angle = FixedPoint::from_num(tenths as f64 / 10.0);
            let recovered = atan2(sine(angle), cosine(angle));
            assert!(recovered > -DEG_180 && recovered <= DEG_180);
            let error = angle_difference(as_f64(recovered), as_f64(angle));
            assert!(error.abs() < 1.0, "{angle}: got {recovered}");
            tenths += 7;
        }
    }
}
