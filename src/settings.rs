//! Per-aircraft settings and their byte layout.
//!
//! The record is written field by field, little-endian, in declaration order.
//! A shorter record (written by an older layout) decodes the fields it has
//! and leaves the rest at their defaults.

use heapless::Vec;

use crate::config::{
    DEFAULT_ARMED_MIN_MOTOR_PULSE_US, DEFAULT_BATTERY_UNDERVOLTAGE_LIMIT,
    DEFAULT_GAIN_SCHEDULING_FACTOR,
};
use crate::control::{OutputConfig, PidAxis, PidGains, RateLimits};
use crate::flight::{AuxSwitchMask, Checkbox, CheckboxConfig, CHECKBOX_COUNT};
use crate::math::{fp, multiply, FixedPoint, Vector3, ONE};

pub const MAX_TX_ID_LEN: usize = 4;
pub const MAX_HOP_CHANNELS: usize = 16;

/// Radio binding remembered across power cycles so the receiver does not
/// have to re-bind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoundRadio {
    /// Protocol id, 0 when nothing is bound.
    pub protocol: u8,
    pub tx_id: Vec<u8, MAX_TX_ID_LEN>,
    pub hop_table: Vec<u8, MAX_HOP_CHANNELS>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSettings {
    pub pid_gains: [PidGains; PidAxis::COUNT],
    pub rates: RateLimits,
    pub checkboxes: CheckboxConfig,
    /// Subtracted from raw gyro readings, deg/s.
    pub gyro_calibration: Vector3,
    /// Subtracted from raw accelerometer readings, g.
    pub acc_calibration: Vector3,
    pub compass_zero_offset: Vector3,
    pub compass_multiplier: Vector3,
    pub gain_scheduling_factor: FixedPoint,
    pub output: OutputConfig,
    /// Volts.
    pub battery_undervoltage_limit: FixedPoint,
    pub bound_radio: BoundRadio,
}

impl Default for UserSettings {
    fn default() -> Self {
        let attitude = PidGains::from_bits(15 << 3, 8, 8 << 2);
        Self {
            pid_gains: [
                attitude,
                attitude,
                PidGains::from_bits(30 << 3, 8, 8 << 2),
                PidGains::from_bits(27 << 7, 0, 6 << 9),
                PidGains::from_bits(25 << 11, 0, 188 << 8),
            ],
            rates: RateLimits { roll_and_pitch: fp(400), yaw: fp(400) },
            checkboxes: CheckboxConfig::default(),
            gyro_calibration: Vector3::ZERO,
            acc_calibration: Vector3::ZERO,
            compass_zero_offset: Vector3::ZERO,
            compass_multiplier: Vector3::new(ONE, ONE, ONE),
            gain_scheduling_factor: DEFAULT_GAIN_SCHEDULING_FACTOR,
            output: OutputConfig {
                armed_min_pulse_us: DEFAULT_ARMED_MIN_MOTOR_PULSE_US,
                reverse_yaw: false,
            },
            battery_undervoltage_limit: DEFAULT_BATTERY_UNDERVOLTAGE_LIMIT,
            bound_radio: BoundRadio::default(),
        }
    }
}

/// Bytes one encoded record occupies.
pub const ENCODED_LEN: usize = PidAxis::COUNT * 3 * 4 // gains
    + 2 * 4 // rates
    + CHECKBOX_COUNT * 2
    + 4 * 3 * 4 // calibration vectors
    + 4 // gain scheduling
    + 2 + 1 // output
    + 4 // battery
    + 1 + 1 + MAX_TX_ID_LEN + 1 + MAX_HOP_CHANNELS;

pub type EncodedSettings = Vec<u8, ENCODED_LEN>;

impl UserSettings {
    pub fn gains(&self, axis: PidAxis) -> &PidGains {
        &self.pid_gains[axis as usize]
    }

    /// Applies the compass calibration to a raw field reading.
    pub fn calibrate_compass(&self, raw: Vector3) -> Vector3 {
        let centered = raw - self.compass_zero_offset;
        Vector3::new(
            multiply(centered.x, self.compass_multiplier.x),
            multiply(centered.y, self.compass_multiplier.y),
            multiply(centered.z, self.compass_multiplier.z),
        )
    }

    pub fn encode(&self) -> EncodedSettings {
        let mut writer = Writer(Vec::new());
        for gains in &self.pid_gains {
            writer.fixed(gains.p);
            writer.fixed(gains.i);
            writer.fixed(gains.d);
        }
        writer.fixed(self.rates.roll_and_pitch);
        writer.fixed(self.rates.yaw);
        for (_, mask) in self.checkboxes.iter() {
            writer.u16(mask.bits());
        }
        for vector in [
            &self.gyro_calibration,
            &self.acc_calibration,
            &self.compass_zero_offset,
            &self.compass_multiplier,
        ] {
            writer.vector(vector);
        }
        writer.fixed(self.gain_scheduling_factor);
        writer.u16(self.output.armed_min_pulse_us);
        writer.u8(self.output.reverse_yaw as u8);
        writer.fixed(self.battery_undervoltage_limit);
        writer.u8(self.bound_radio.protocol);
        writer.padded(&self.bound_radio.tx_id, MAX_TX_ID_LEN);
        writer.padded(&self.bound_radio.hop_table, MAX_HOP_CHANNELS);
        writer.0
    }

    /// Decodes a record over the defaults. Never fails: a truncated record
    /// keeps defaults for whatever it does not cover.
    pub fn decode(bytes: &[u8]) -> Self {
        let mut settings = Self::default();
        let mut reader = Reader(bytes);
        if settings.read_fields(&mut reader).is_none() {
            debug!("settings record ends early, remaining fields use defaults");
        }
        settings
    }

    fn read_fields(&mut self, reader: &mut Reader<'_>) -> Option<()> {
        for gains in self.pid_gains.iter_mut() {
            gains.p = reader.fixed()?;
            gains.i = reader.fixed()?;
            gains.d = reader.fixed()?;
        }
        self.rates.roll_and_pitch = reader.fixed()?;
        self.rates.yaw = reader.fixed()?;
        for checkbox in Checkbox::ALL {
            self.checkboxes.set(checkbox, AuxSwitchMask::from_bits_truncate(reader.u16()?));
        }
        for vector in [
            &mut self.gyro_calibration,
            &mut self.acc_calibration,
            &mut self.compass_zero_offset,
            &mut self.compass_multiplier,
        ] {
            *vector = reader.vector()?;
        }
        self.gain_scheduling_factor = reader.fixed()?;
        self.output.armed_min_pulse_us = reader.u16()?;
        self.output.reverse_yaw = reader.u8()? != 0;
        self.battery_undervoltage_limit = reader.fixed()?;
        self.bound_radio.protocol = reader.u8()?;
        self.bound_radio.tx_id = reader.padded(MAX_TX_ID_LEN)?;
        self.bound_radio.hop_table = reader.padded(MAX_HOP_CHANNELS)?;
        Some(())
    }
}

// ── Byte layout helpers ───────────────────────────────────────────────────────

struct Writer(EncodedSettings);

impl Writer {
    fn bytes(&mut self, bytes: &[u8]) {
        // ENCODED_LEN covers every field written below.
        let _ = self.0.extend_from_slice(bytes);
    }

    fn u8(&mut self, value: u8) {
        self.bytes(&[value]);
    }

    fn u16(&mut self, value: u16) {
        self.bytes(&value.to_le_bytes());
    }

    fn fixed(&mut self, value: FixedPoint) {
        self.bytes(&value.to_bits().to_le_bytes());
    }

    fn vector(&mut self, vector: &Vector3) {
        self.fixed(vector.x);
        self.fixed(vector.y);
        self.fixed(vector.z);
    }

    /// Length byte, then `capacity` bytes with the unused tail zeroed.
    fn padded(&mut self, data: &[u8], capacity: usize) {
        self.u8(data.len() as u8);
        self.bytes(data);
        for _ in data.len()..capacity {
            self.u8(0);
        }
    }
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let (head, rest) = self.0.split_first_chunk::<N>()?;
        self.0 = rest;
        Some(*head)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn u16(&mut self) -> Option<u16> {
        self.take().map(u16::from_le_bytes)
    }

    fn fixed(&mut self) -> Option<FixedPoint> {
        self.take().map(|b| FixedPoint::from_bits(i32::from_le_bytes(b)))
    }

    fn vector(&mut self) -> Option<Vector3> {
        Some(Vector3::new(self.fixed()?, self.fixed()?, self.fixed()?))
    }

    fn padded<const N: usize>(&mut self, capacity: usize) -> Option<Vec<u8, N>> {
        let len = usize::from(self.u8()?).min(capacity).min(N);
        let mut out = Vec::new();
        for index in 0..capacity {
            let byte = self.u8()?;
            if index < len {
                let _ = out.push(byte);
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{fp_ratio, ZERO};

    fn zeroed_gains() -> [PidGains; PidAxis::COUNT] {
        [PidGains::new(ZERO, ZERO, ZERO); PidAxis::COUNT]
    }

    fn customized() -> UserSettings {
        let mut settings = UserSettings::default();
        settings.pid_gains = zeroed_gains();
        settings.pid_gains[PidAxis::Yaw as usize] = PidGains::new(fp(3), fp_ratio(1, 100), fp(-2));
        settings.rates.yaw = fp(250);
        settings.checkboxes.set(Checkbox::Arm, AuxSwitchMask::AUX1_HIGH | AuxSwitchMask::AUX4_LOW);
        settings.gyro_calibration = Vector3::new(fp_ratio(3, 7), fp(-2), fp_ratio(1, 1000));
        settings.output.reverse_yaw = true;
        settings.output.armed_min_pulse_us = 1100;
        settings.bound_radio.protocol = 2;
        settings.bound_radio.tx_id.extend_from_slice(&[0xA1, 0xB2, 0xC3]).unwrap();
        settings.bound_radio.hop_table.extend_from_slice(&[5, 17, 33, 41]).unwrap();
        settings
    }

    #[test]
    fn defaults_match_the_tuned_gains() {
        let settings = UserSettings::default();
        assert_eq!(settings.gains(PidAxis::Roll).p.to_bits(), 120);
        assert_eq!(settings.gains(PidAxis::Yaw).p.to_bits(), 240);
        assert_eq!(settings.gains(PidAxis::Altitude).i, ZERO);
        assert_eq!(settings.checkboxes.get(Checkbox::Arm), AuxSwitchMask::AUX2_HIGH);
        assert_eq!(settings.compass_multiplier, Vector3::new(ONE, ONE, ONE));
    }

    #[test]
    fn record_has_the_declared_length() {
        assert_eq!(customized().encode().len(), ENCODED_LEN);
    }

    #[test]
    fn decoding_restores_every_field() {
        let original = customized();
        assert_eq!(UserSettings::decode(&original.encode()), original);
    }

    #[test]
    fn truncated_record_keeps_defaults_for_the_tail() {
        let original = customized();
        let encoded = original.encode();
        // Gains, rates and checkboxes only.
        let cut = PidAxis::COUNT * 12 + 8 + CHECKBOX_COUNT * 2;
        let decoded = UserSettings::decode(&encoded[..cut]);
        assert_eq!(decoded.pid_gains, original.pid_gains);
        assert_eq!(decoded.checkboxes, original.checkboxes);
        assert_eq!(decoded.gyro_calibration, Vector3::ZERO);
        assert_eq!(decoded.bound_radio, BoundRadio::default());
    }

    #[test]
    fn empty_record_is_the_defaults() {
        assert_eq!(UserSettings::decode(&[]), UserSettings::default());
    }

    #[test]
    fn compass_calibration_centers_then_scales() {
        let mut settings = UserSettings::default();
        settings.compass_zero_offset = Vector3::new(fp(1), ZERO, fp(-1));
        settings.compass_multiplier = Vector3::new(fp(2), ONE, fp_ratio(1, 2));
        let calibrated = settings.calibrate_compass(Vector3::new(fp(3), fp(3), fp(3)));
        assert_eq!(calibrated, Vector3::new(fp(4), fp(3), fp(2)));
    }
}
