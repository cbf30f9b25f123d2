use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::spi::{Error, Instance, Spi};
use embassy_time::{block_for, Duration};
use heapless::Vec;
use quadcore::persist::SettingsStore;
use quadcore::PersistError;

const CMD_JEDEC_ID: u8 = 0x9F;
const CMD_READ_DATA: u8 = 0x03;
const CMD_PAGE_PROGRAM: u8 = 0x02;
const CMD_WRITE_ENABLE: u8 = 0x06;
const CMD_SECTOR_ERASE: u8 = 0x20;
const CMD_READ_STATUS1: u8 = 0x05;
const STATUS_BUSY: u8 = 0x01;

const WINBOND_MANUFACTURER_ID: u8 = 0xEF;
const PAGE_SIZE: usize = 256;
/// First 4 KiB sector holds the settings envelope.
const SETTINGS_ADDRESS: u32 = 0;
/// Sector erase is 400 ms worst case.
const BUSY_TIMEOUT_MS: u32 = 500;

/// W25Qxx SPI NOR flash holding the settings. Writes are staged in RAM;
/// `commit` erases the sector and programs the staged page.
pub struct W25qxx<'d, T: Instance, Tx, Rx> {
    spi: Spi<'d, T, Tx, Rx>,
    cs: Output<'d, AnyPin>,
    staged: Vec<u8, PAGE_SIZE>,
}

impl<'d, T: Instance, Tx, Rx> W25qxx<'d, T, Tx, Rx> {
    pub fn new(spi: Spi<'d, T, Tx, Rx>, cs: Output<'d, AnyPin>) -> Self {
        Self { spi, cs, staged: Vec::new() }
    }

    pub fn read_id(&mut self) -> Result<[u8; 3], Error> {
        let mut id = [0u8; 3];
        self.transaction(&[CMD_JEDEC_ID], |spi| spi.blocking_read(&mut id))?;
        Ok(id)
    }

    /// Logs the part; a missing chip shows up here rather than as a
    /// silent fallback to defaults.
    pub fn probe(&mut self) -> bool {
        match self.read_id() {
            Ok(id) if id[0] == WINBOND_MANUFACTURER_ID => {
                defmt::info!("flash: w25q id {=u8:#x} {=u8:#x}", id[1], id[2]);
                true
            }
            Ok(id) => {
                defmt::warn!("flash: unexpected id {=u8:#x}", id[0]);
                false
            }
            Err(_) => {
                defmt::warn!("flash: no answer");
                false
            }
        }
    }

    fn transaction(
        &mut self,
        command: &[u8],
        body: impl FnOnce(&mut Spi<'d, T, Tx, Rx>) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.cs.set_low();
        let res = self.spi.blocking_write(command).and_then(|()| body(&mut self.spi));
        self.cs.set_high();
        res
    }

    fn write_enable(&mut self) -> Result<(), Error> {
        self.transaction(&[CMD_WRITE_ENABLE], |_| Ok(()))
    }

    fn wait_idle(&mut self) -> Result<(), PersistError> {
        for _ in 0..BUSY_TIMEOUT_MS {
            let mut status = [0u8; 1];
            self.transaction(&[CMD_READ_STATUS1], |spi| spi.blocking_read(&mut status))
                .map_err(|_| PersistError::CommitFailed)?;
            if status[0] & STATUS_BUSY == 0 {
                return Ok(());
            }
            block_for(Duration::from_millis(1));
        }
        Err(PersistError::CommitFailed)
    }
}

fn command_at(command: u8, address: u32) -> [u8; 4] {
    let [_, a2, a1, a0] = address.to_be_bytes();
    [command, a2, a1, a0]
}

impl<T: Instance, Tx, Rx> SettingsStore for W25qxx<'_, T, Tx, Rx> {
    fn read_block(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), PersistError> {
        let command = command_at(CMD_READ_DATA, SETTINGS_ADDRESS + offset as u32);
        self.transaction(&command, |spi| spi.blocking_read(buffer))
            .map_err(|_| PersistError::ReadFailed)
    }

    fn write_block(&mut self, offset: usize, data: &[u8]) -> Result<(), PersistError> {
        let end = offset + data.len();
        if end > PAGE_SIZE {
            return Err(PersistError::TooLarge);
        }
        if end > self.staged.len() {
            // Erased flash reads 0xFF.
            self.staged.resize(end, 0xFF).map_err(|_| PersistError::TooLarge)?;
        }
        self.staged[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PersistError> {
        let erase = command_at(CMD_SECTOR_ERASE, SETTINGS_ADDRESS);
        self.write_enable().map_err(|_| PersistError::CommitFailed)?;
        self.transaction(&erase, |_| Ok(())).map_err(|_| PersistError::CommitFailed)?;
        self.wait_idle()?;

        let program = command_at(CMD_PAGE_PROGRAM, SETTINGS_ADDRESS);
        let staged = core::mem::take(&mut self.staged);
        self.write_enable().map_err(|_| PersistError::WriteFailed)?;
        self.transaction(&program, |spi| spi.blocking_write(&staged))
            .map_err(|_| PersistError::WriteFailed)?;
        self.wait_idle()
    }
}
