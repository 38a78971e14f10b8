//! Settings records over sequential-storage
//!
//! The settings partition is a sequential-storage map keyed by
//! [`StorageKey`]. Wear is spread over every sector in the partition and a
//! record only replaces its predecessor once fully programmed.

use core::ops::Range;

use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

pub use glance_hal::flash::{FlashError, StorageKey};

/// Largest record plus item header
const RECORD_BUFFER_LEN: usize = 1024;

/// Key/value records on a NOR flash region
pub struct SettingsFlash<F> {
    flash: F,
    range: Range<u32>,
}

impl<F: NorFlash> SettingsFlash<F> {
    /// Use all of `flash` for records
    pub fn new(flash: F) -> Self {
        let range = 0..flash.capacity() as u32;
        Self { flash, range }
    }

    fn map_error<E>(error: sequential_storage::Error<E>) -> FlashError {
        match error {
            sequential_storage::Error::Storage { .. } => FlashError::Flash,
            sequential_storage::Error::FullStorage => FlashError::Full,
            _ => FlashError::Storage,
        }
    }
}

impl<F: NorFlash> glance_hal::FlashStorage for SettingsFlash<F> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let mut data_buffer = [0u8; RECORD_BUFFER_LEN];

        let item = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
        )
        .await
        .map_err(Self::map_error)?;

        let data = item.ok_or(FlashError::NotFound)?;
        let slot = buffer
            .get_mut(..data.len())
            .ok_or(FlashError::BufferTooSmall)?;
        slot.copy_from_slice(data);
        Ok(data.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        let mut data_buffer = [0u8; RECORD_BUFFER_LEN];

        map::store_item(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
            &data,
        )
        .await
        .map_err(Self::map_error)
    }

    async fn exists(&mut self, key: StorageKey) -> bool {
        let mut data_buffer = [0u8; RECORD_BUFFER_LEN];

        matches!(
            map::fetch_item::<StorageKey, &[u8], _>(
                &mut self.flash,
                self.range.clone(),
                &mut NoCache::new(),
                &mut data_buffer,
                &key,
            )
            .await,
            Ok(Some(_))
        )
    }

    async fn erase_all(&mut self) -> Result<(), FlashError> {
        self.flash
            .erase(self.range.start, self.range.end)
            .await
            .map_err(|_| FlashError::Flash)
    }
}
