//! Settings envelope on top of a byte-addressed store.
//!
//! Layout: magic `u16`, record size `i16`, then the record, all little-endian
//! from offset 0. Anything unexpected on load means compiled defaults.

use heapless::Vec;

use crate::error::PersistError;
use crate::settings::{UserSettings, ENCODED_LEN};

pub const MAGIC: u16 = 12345;
pub const HEADER_LEN: usize = 4;

/// Non-volatile storage for the settings blob: EEPROM, a flash page, a file.
pub trait SettingsStore {
    fn read_block(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), PersistError>;

    fn write_block(&mut self, offset: usize, data: &[u8]) -> Result<(), PersistError>;

    /// Makes preceding writes durable.
    fn commit(&mut self) -> Result<(), PersistError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSettings {
    pub settings: UserSettings,
    /// `false` when the defaults were substituted.
    pub from_persistent_store: bool,
}

impl LoadedSettings {
    fn defaults() -> Self {
        Self { settings: UserSettings::default(), from_persistent_store: false }
    }
}

/// Reads the settings, falling back to defaults on a read error, a foreign
/// magic number or a record larger than this build understands.
pub fn load(store: &mut dyn SettingsStore) -> LoadedSettings {
    let mut header = [0u8; HEADER_LEN];
    if let Err(e) = store.read_block(0, &mut header) {
        warn!("settings header unreadable: {}", e);
        return LoadedSettings::defaults();
    }

    let magic = u16::from_le_bytes([header[0], header[1]]);
    if magic != MAGIC {
        info!("no stored settings (magic {=u16}), using defaults", magic);
        return LoadedSettings::defaults();
    }

    let size = i16::from_le_bytes([header[2], header[3]]);
    let size = match usize::try_from(size) {
        Ok(size) if size <= ENCODED_LEN => size,
        _ => {
            warn!("stored settings size {=i16} not understood, using defaults", size);
            return LoadedSettings::defaults();
        }
    };

    let mut record = [0u8; ENCODED_LEN];
    if let Err(e) = store.read_block(HEADER_LEN, &mut record[..size]) {
        warn!("settings record unreadable: {}", e);
        return LoadedSettings::defaults();
    }

    info!("settings loaded from store ({=usize} bytes)", size);
    LoadedSettings { settings: UserSettings::decode(&record[..size]), from_persistent_store: true }
}

/// Writes the envelope and commits it.
pub fn save(store: &mut dyn SettingsStore, settings: &UserSettings) -> Result<(), PersistError> {
    let record = settings.encode();
    let size = i16::try_from(record.len()).map_err(|_| PersistError::TooLarge)?;

    let mut envelope: Vec<u8, { HEADER_LEN + ENCODED_LEN }> = Vec::new();
    envelope.extend_from_slice(&MAGIC.to_le_bytes()).map_err(|_| PersistError::TooLarge)?;
    envelope.extend_from_slice(&size.to_le_bytes()).map_err(|_| PersistError::TooLarge)?;
    envelope.extend_from_slice(&record).map_err(|_| PersistError::TooLarge)?;

    let result = store.write_block(0, &envelope).and_then(|()| store.commit());
    match &result {
        Ok(()) => info!("settings saved ({=usize} bytes)", envelope.len()),
        Err(e) => error!("settings save failed: {}", e),
    }
    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::control::PidAxis;
    use crate::flight::{AuxSwitchMask, Checkbox};
    use crate::math::fp;

    /// RAM-backed store. Erased bytes read as 0xFF like flash.
    pub struct MemoryStore {
        pub bytes: [u8; 256],
        pub commits: u32,
        pub fail_writes: bool,
    }

    impl Default for MemoryStore {
        fn default() -> Self {
            Self { bytes: [0xFF; 256], commits: 0, fail_writes: false }
        }
    }

    impl SettingsStore for MemoryStore {
        fn read_block(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), PersistError> {
            let source = self.bytes.get(offset..offset + buffer.len()).ok_or(PersistError::ReadFailed)?;
            buffer.copy_from_slice(source);
            Ok(())
        }

        fn write_block(&mut self, offset: usize, data: &[u8]) -> Result<(), PersistError> {
            if self.fail_writes {
                return Err(PersistError::WriteFailed);
            }
            let target = self.bytes.get_mut(offset..offset + data.len()).ok_or(PersistError::WriteFailed)?;
            target.copy_from_slice(data);
            Ok(())
        }

        fn commit(&mut self) -> Result<(), PersistError> {
            self.commits += 1;
            Ok(())
        }
    }

    #[test]
    fn blank_store_gives_defaults() {
        let loaded = load(&mut MemoryStore::default());
        assert_eq!(loaded.settings, UserSettings::default());
        assert!(!loaded.from_persistent_store);
    }

    #[test]
    fn wrong_magic_gives_defaults_exactly() {
        let mut store = MemoryStore::default();
        let mut tuned = UserSettings::default();
        tuned.rates.yaw = fp(123);
        save(&mut store, &tuned).unwrap();
        store.bytes[0] ^= 0x01;

        let loaded = load(&mut store);
        assert_eq!(loaded.settings, UserSettings::default());
        assert!(!loaded.from_persistent_store);
    }

    #[test]
    fn saved_settings_load_back() {
        let mut store = MemoryStore::default();
        let mut tuned = UserSettings::default();
        tuned.pid_gains[PidAxis::Pitch as usize].p = fp(2);
        tuned.checkboxes.set(Checkbox::Uncrashable, AuxSwitchMask::AUX3_HIGH);
        save(&mut store, &tuned).unwrap();
        assert_eq!(store.commits, 1);
        assert_eq!(&store.bytes[..2], &MAGIC.to_le_bytes());

        let loaded = load(&mut store);
        assert!(loaded.from_persistent_store);
        assert_eq!(loaded.settings, tuned);
    }

    #[test]
    fn oversized_record_gives_defaults() {
        let mut store = MemoryStore::default();
        save(&mut store, &UserSettings::default()).unwrap();
        let too_big = (ENCODED_LEN as i16 + 1).to_le_bytes();
        store.bytes[2..4].copy_from_slice(&too_big);
        assert!(!load(&mut store).from_persistent_store);

        store.bytes[2..4].copy_from_slice(&(-1i16).to_le_bytes());
        assert!(!load(&mut store).from_persistent_store);
    }

    #[test]
    fn shorter_record_is_accepted() {
        let mut store = MemoryStore::default();
        let mut tuned = UserSettings::default();
        tuned.pid_gains[PidAxis::Roll as usize].d = fp(9);
        tuned.gyro_calibration.x = fp(4);
        save(&mut store, &tuned).unwrap();
        store.bytes[2..4].copy_from_slice(&(PidAxis::COUNT as i16 * 12).to_le_bytes());

        let loaded = load(&mut store);
        assert!(loaded.from_persistent_store);
        assert_eq!(loaded.settings.pid_gains, tuned.pid_gains);
        assert_eq!(loaded.settings.gyro_calibration, UserSettings::default().gyro_calibration);
    }

    #[test]
    fn write_failure_is_reported_and_not_committed() {
        let mut store = MemoryStore { fail_writes: true, ..MemoryStore::default() };
        assert_eq!(save(&mut store, &UserSettings::default()), Err(PersistError::WriteFailed));
        assert_eq!(store.commits, 0);
    }
}
