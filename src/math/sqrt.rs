use super::{multiply, multiply_raw, shr, FixedPoint, ONE, THREE};

// 1/sqrt((i + 4.5) / 16) for i in 0..12: seeds across [0.25, 1).
const INV_SQRT_SEED: [i32; 12] = [
    123575, 111778, 102821, 95721, 89914, 85050, 80899, 77302, 74145, 71346, 68842, 66584,
];

const QUARTER_BITS: i32 = ONE.to_bits() >> 2;

/// `1 / sqrt(x)`, or zero for non-positive input.
///
/// `x` is scaled by powers of four into [0.25, 1) while the result is scaled
/// by the matching powers of two, seeded from a table and refined with one
/// Newton step `y = y * (3 - x * y * y) / 2`.
pub fn inv_sqrt(x: FixedPoint) -> FixedPoint {
    if x <= FixedPoint::ZERO {
        return FixedPoint::ZERO;
    }

    let mut y = ONE.to_bits();
    let mut scaled = x.to_bits();

    while scaled < QUARTER_BITS {
        y <<= 1;
        scaled <<= 2;
    }
    while scaled >= ONE.to_bits() {
        y >>= 1;
        scaled >>= 2;
    }

    let index = ((scaled >> 12) - 4) as usize;
    let y = FixedPoint::from_bits(multiply_raw(y, INV_SQRT_SEED[index]));

    let x_y_squared = multiply(y, multiply(x, y));
    shr(multiply(y, THREE - x_y_squared), 1)
}

/// `x * inv_sqrt(x)`, so zero for non-positive input as well.
pub fn sqrt(x: FixedPoint) -> FixedPoint {
    multiply(x, inv_sqrt(x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{fp, fp_ratio};
    use approx::assert_relative_eq;

    #[test]
    fn non_positive_input_is_zero() {
        assert_eq!(inv_sqrt(FixedPoint::ZERO), FixedPoint::ZERO);
        assert_eq!(inv_sqrt(fp(-4)), FixedPoint::ZERO);
        assert_eq!(sqrt(fp(-1)), FixedPoint::ZERO);
    }

    #[test]
    fn inv_sqrt_across_the_range() {
        let samples = [
            fp_ratio(1, 1000),
            fp_ratio(1, 16),
            fp_ratio(1, 4),
            fp_ratio(1, 2),
            fp(1),
            fp(2),
            fp(3),
            fp(10),
            fp(100),
            fp(10_000),
        ];
        for x in samples {
            let expected = 1.0 / x.to_num::<f64>().sqrt();
            assert_relative_eq!(inv_sqrt(x).to_num::<f64>(), expected, max_relative = 0.01);
        }
    }

    #[test]
    fn sqrt_of_squares() {
        for n in 1..=150 {
            let root = sqrt(fp(n * n)).to_num::<f64>();
            assert_relative_eq!(root, n as f64, max_relative = 0.01);
        }
    }
}
