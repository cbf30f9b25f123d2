use quadcore::math::{fp_ratio, multiply, string_to_fixed_point, string_to_long, FixedPoint};
use quadcore::sensors::{Coordinate, GpsFix};

const MAX_SENTENCE: usize = 96;
const KNOTS_TO_METERS_PER_SECOND: FixedPoint = fp_ratio(514_444, 1_000_000);

/// NMEA 0183 reader for the two sentences navigation needs: GGA for the
/// position and satellite count, RMC for ground speed and course.
pub struct NmeaParser {
    line: heapless::Vec<u8, MAX_SENTENCE>,
    fix: GpsFix,
    checksum_errors: u32,
}

impl NmeaParser {
    pub fn new() -> Self {
        Self { line: heapless::Vec::new(), fix: GpsFix::default(), checksum_errors: 0 }
    }

    pub fn checksum_errors(&self) -> u32 {
        self.checksum_errors
    }

    /// Returns a fix each time a GGA sentence completes. Without a position
    /// solution the fix reports zero satellites.
    pub fn push_byte(&mut self, b: u8) -> Option<GpsFix> {
        match b {
            b'$' => {
                self.line.clear();
                None
            }
            b'\r' | b'\n' => {
                let fix = self.sentence();
                self.line.clear();
                fix
            }
            _ => {
                if self.line.push(b).is_err() {
                    self.line.clear();
                }
                None
            }
        }
    }

    pub fn push_data(&mut self, data: &[u8]) -> Option<GpsFix> {
        data.iter().fold(None, |latest, &b| self.push_byte(b).or(latest))
    }

    fn sentence(&mut self) -> Option<GpsFix> {
        let star = self.line.iter().position(|&b| b == b'*')?;
        let (body, checksum) = (&self.line[..star], &self.line[star + 1..]);
        if checksum.len() < 2 || body.iter().fold(0u8, |acc, &b| acc ^ b) != hex_byte(checksum)? {
            self.checksum_errors = self.checksum_errors.wrapping_add(1);
            return None;
        }

        let mut fields = body.split(|&b| b == b',');
        let talker = fields.next()?;
        let kind = talker.get(talker.len().checked_sub(3)?..)?;
        let fix = &mut self.fix;
        match kind {
            b"GGA" => {
                // time, lat, N/S, lon, E/W, quality, satellites, ...
                let _time = fields.next()?;
                let latitude = coordinate(fields.next()?, fields.next()?)?;
                let longitude = coordinate(fields.next()?, fields.next()?)?;
                let quality = string_to_long(fields.next()?);
                let satellites = string_to_long(fields.next()?);
                fix.latitude = latitude;
                fix.longitude = longitude;
                fix.satellites = if quality > 0 { satellites.clamp(0, u8::MAX as i32) as u8 } else { 0 };
                Some(*fix)
            }
            b"RMC" => {
                // time, status, lat, N/S, lon, E/W, speed (knots), course
                let mut fields = fields.skip(6);
                let knots = string_to_fixed_point(fields.next()?);
                fix.ground_speed = multiply(knots, KNOTS_TO_METERS_PER_SECOND);
                fix.course = string_to_fixed_point(fields.next()?);
                None
            }
            _ => None,
        }
    }
}

fn hex_byte(text: &[u8]) -> Option<u8> {
    let digit = |c: u8| (c as char).to_digit(16);
    Some((digit(text[0])? * 16 + digit(text[1])?) as u8)
}

/// `ddmm.mmmm` (or `dddmm.mmmm`) plus hemisphere to a coordinate. Empty
/// while the receiver has no solution.
fn coordinate(text: &[u8], hemisphere: &[u8]) -> Option<Coordinate> {
    let point = text.iter().position(|&b| b == b'.')?;
    let degree_digits = point.checked_sub(2)?;
    let degrees = string_to_long(&text[..degree_digits]) as i64;
    let minutes = string_to_fixed_point(&text[degree_digits..]).to_bits() as i64;

    let mut e7 = degrees * 10_000_000 + minutes * 10_000_000 / (60 << 16);
    if matches!(hemisphere, b"S" | b"W") {
        e7 = -e7;
    }
    Some(Coordinate::from_degrees_e7(e7 as i32))
}
