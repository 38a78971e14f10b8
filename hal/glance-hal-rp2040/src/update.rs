//! Firmware image staging
//!
//! The image is streamed into the bootloader's DFU partition one erase
//! sector at a time through [`FirmwareUpdater`]. Finishing an image marks
//! it for swap; the bootloader copies it into the active slot on the next
//! reset and reverts unless the new image calls [`DfuWriter::mark_booted`].

use embassy_boot_rp::{FirmwareUpdater, FirmwareUpdaterConfig, State};
use embassy_rp::flash::ERASE_SIZE;
use embedded_storage_async::nor_flash::NorFlash;
use glance_hal::{FirmwareError, FirmwareWriter, SectorBuffer};

/// Streams an image into the DFU partition for the bootloader to swap in
pub struct DfuWriter<'d, DFU: NorFlash, STATE: NorFlash> {
    updater: FirmwareUpdater<'d, DFU, STATE>,
    buffer: SectorBuffer<ERASE_SIZE>,
    free: u32,
    capacity: Option<u32>,
    len: u32,
}

impl<'d, DFU: NorFlash, STATE: NorFlash> DfuWriter<'d, DFU, STATE> {
    /// `aligned` is scratch space for boot state writes, one state
    /// partition write unit long.
    pub fn new(config: FirmwareUpdaterConfig<DFU, STATE>, aligned: &'d mut [u8]) -> Self {
        let free = config.dfu.capacity() as u32;
        Self {
            updater: FirmwareUpdater::new(config, aligned),
            buffer: SectorBuffer::new(),
            free,
            capacity: None,
            len: 0,
        }
    }

    /// Confirm the running image so the bootloader keeps it.
    ///
    /// Returns `true` when this is the first boot after a swap.
    pub async fn mark_booted(&mut self) -> Result<bool, FirmwareError> {
        let swapped = matches!(self.updater.get_state().await, Ok(State::Swap));
        self.updater
            .mark_booted()
            .await
            .map_err(|_| FirmwareError::Activate)?;
        Ok(swapped)
    }

    async fn flush_sector(&mut self) -> Result<(), FirmwareError> {
        let (offset, sector) = self.buffer.sector();
        self.updater
            .write_firmware(offset, sector)
            .await
            .map_err(|_| FirmwareError::Flash)?;
        self.buffer.advance();
        Ok(())
    }
}

impl<DFU: NorFlash, STATE: NorFlash> FirmwareWriter for DfuWriter<'_, DFU, STATE> {
    fn free_space(&self) -> u32 {
        self.free
    }

    async fn begin(&mut self, capacity: u32) -> Result<(), FirmwareError> {
        if capacity == 0 || capacity > self.free {
            return Err(FirmwareError::NoSpace);
        }
        self.buffer.reset();
        self.len = 0;
        self.capacity = Some(capacity);
        Ok(())
    }

    async fn write(&mut self, mut chunk: &[u8]) -> Result<usize, FirmwareError> {
        let capacity = self.capacity.ok_or(FirmwareError::NotStarted)?;
        let room = (capacity - self.len) as usize;
        if chunk.len() > room {
            chunk = &chunk[..room];
        }
        let accepted = chunk.len();

        while !chunk.is_empty() {
            let taken = self.buffer.fill(chunk);
            chunk = &chunk[taken..];
            if self.buffer.is_full() {
                self.flush_sector().await?;
            }
        }

        self.len += accepted as u32;
        Ok(accepted)
    }

    async fn finish(&mut self) -> Result<u32, FirmwareError> {
        if self.capacity.is_none() {
            return Err(FirmwareError::NotStarted);
        }
        if self.len == 0 {
            return Err(FirmwareError::Empty);
        }
        if !self.buffer.is_empty() {
            self.flush_sector().await?;
        }

        self.updater
            .mark_updated()
            .await
            .map_err(|_| FirmwareError::Activate)?;

        self.capacity = None;
        Ok(self.len)
    }

    fn abort(&mut self) {
        self.capacity = None;
        self.buffer.reset();
        self.len = 0;
    }
}
