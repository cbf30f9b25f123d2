use super::{multiply_raw, FixedPoint, FIXED_POINT_SHIFT};

const FRACTION_DIGITS: usize = 6;

/// 10^-6 · 2^16 · 2^16 · 2^5, so `multiply_raw(micros, M) >> 5` is micros in fixed point.
const MICROS_TO_FIXED: i32 = 137_439;

fn split_sign(text: &[u8]) -> (bool, &[u8]) {
    match text.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, text),
    }
}

fn leading_digits(text: &[u8]) -> &[u8] {
    let end = text.iter().position(|b| !b.is_ascii_digit()).unwrap_or(text.len());
    &text[..end]
}

fn accumulate(digits: &[u8]) -> i32 {
    digits
        .iter()
        .fold(0i32, |acc, &d| acc.wrapping_mul(10).wrapping_add((d - b'0') as i32))
}

/// Parses an optionally negative decimal integer, stopping at the first
/// character that is not a digit.
pub fn string_to_long(text: &[u8]) -> i32 {
    let (negative, rest) = split_sign(text);
    let value = accumulate(leading_digits(rest));
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

/// Parses decimal text such as `-12.375` into fixed point.
///
/// At most six fractional digits are used; anything after the number is
/// ignored.
pub fn string_to_fixed_point(text: &[u8]) -> FixedPoint {
    let (negative, rest) = split_sign(text);
    let whole = leading_digits(rest);
    let mut value = accumulate(whole).wrapping_shl(FIXED_POINT_SHIFT);

    if let Some((b'.', after_point)) = rest[whole.len()..].split_first() {
        let fraction = leading_digits(after_point);
        let used = &fraction[..fraction.len().min(FRACTION_DIGITS)];
        let mut micros = accumulate(used);
        for _ in used.len()..FRACTION_DIGITS {
            micros *= 10;
        }
        value = value.wrapping_add(multiply_raw(micros, MICROS_TO_FIXED) >> 5);
    }

    FixedPoint::from_bits(if negative { value.wrapping_neg() } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fp;
    use approx::assert_abs_diff_eq;

    #[test]
    fn parses_integers() {
        assert_eq!(string_to_long(b"0"), 0);
        assert_eq!(string_to_long(b"12345"), 12345);
        assert_eq!(string_to_long(b"-42"), -42);
        assert_eq!(string_to_long(b"17abc"), 17);
        assert_eq!(string_to_long(b"3.9"), 3);
        assert_eq!(string_to_long(b""), 0);
        assert_eq!(string_to_long(b"x12"), 0);
    }

    #[test]
    fn parses_whole_fixed_point() {
        assert_eq!(string_to_fixed_point(b"15"), fp(15));
        assert_eq!(string_to_fixed_point(b"-400"), fp(-400));
    }

    #[test]
    fn parses_fractions() {
        let cases: [(&[u8], f64); 6] = [
            (b"0.5", 0.5),
            (b"1.25", 1.25),
            (b"-12.375", -12.375),
            (b"2.7", 2.7),
            (b"0.000001", 0.000001),
            (b"3.14159265358979", 3.141592),
        ];
        for (text, expected) in cases {
            let parsed = string_to_fixed_point(text).to_num::<f64>();
            assert_abs_diff_eq!(parsed, expected, epsilon = 2.0 / 65536.0);
        }
    }

    #[test]
    fn stops_at_first_non_digit() {
        assert_eq!(string_to_fixed_point(b"7,5"), fp(7));
        assert_abs_diff_eq!(string_to_fixed_point(b"7.5kg").to_num::<f64>(), 7.5, epsilon = 1e-4);
        assert_eq!(string_to_fixed_point(b"-"), fp(0));
    }
}
