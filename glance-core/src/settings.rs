//! User settings and their persistence
//!
//! Settings live in a 512-byte image stored as a single flash record:
//!
//! | Offset | Type      | Field                      |
//! |--------|-----------|----------------------------|
//! | 0      | `i32` LE  | timezone offset, seconds   |
//! | 10     | `i32` LE  | brightness, percent        |
//!
//! Every other byte is preserved across saves. There is no version or
//! checksum; each field is range-checked on load instead and a bad field
//! falls back to its default on its own.

use glance_hal::{FlashError, FlashStorage, StorageKey};

/// Size of the settings image
pub const IMAGE_LEN: usize = 512;

const OFFSET_AT: usize = 0;
const BRIGHTNESS_AT: usize = 10;

pub const DEFAULT_TIMEZONE_OFFSET_S: i32 = 28_800;
pub const DEFAULT_BRIGHTNESS_PCT: i32 = 100;

/// Backlight duty at 0% brightness; anything dimmer is invisible.
pub const DIMMEST_DUTY: u8 = 240;

/// User-adjustable settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Local time offset from UTC
    pub timezone_offset_s: i32,
    /// Backlight brightness, 0..=100
    pub brightness_pct: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone_offset_s: DEFAULT_TIMEZONE_OFFSET_S,
            brightness_pct: DEFAULT_BRIGHTNESS_PCT,
        }
    }
}

impl Settings {
    /// Accepted stored offsets: strictly between UTC-12 and UTC+14
    pub fn offset_in_range(offset_s: i32) -> bool {
        -43_200 < offset_s && offset_s < 50_400
    }

    pub fn brightness_in_range(brightness_pct: i32) -> bool {
        (0..=100).contains(&brightness_pct)
    }

    /// PWM duty for the active-low backlight.
    ///
    /// Maps 0..100 % linearly onto 240..0, clamped so out-of-range values
    /// can neither switch the panel off nor wrap.
    pub fn backlight_duty(&self) -> u8 {
        let duty = i64::from(self.brightness_pct) * -i64::from(DIMMEST_DUTY) / 100
            + i64::from(DIMMEST_DUTY);
        duty.clamp(0, i64::from(DIMMEST_DUTY)) as u8
    }

    fn decode(image: &[u8; IMAGE_LEN], defaults: Settings) -> Self {
        let mut settings = defaults;

        let offset = read_i32(image, OFFSET_AT);
        if Self::offset_in_range(offset) {
            settings.timezone_offset_s = offset;
        } else {
            warn!("stored offset {} out of range, keeping {}", offset, defaults.timezone_offset_s);
        }

        let brightness = read_i32(image, BRIGHTNESS_AT);
        if Self::brightness_in_range(brightness) {
            settings.brightness_pct = brightness;
        } else {
            warn!("stored brightness {} out of range, keeping {}", brightness, defaults.brightness_pct);
        }

        settings
    }

    fn encode_into(&self, image: &mut [u8; IMAGE_LEN]) {
        image[OFFSET_AT..OFFSET_AT + 4].copy_from_slice(&self.timezone_offset_s.to_le_bytes());
        image[BRIGHTNESS_AT..BRIGHTNESS_AT + 4].copy_from_slice(&self.brightness_pct.to_le_bytes());
    }
}

fn read_i32(image: &[u8; IMAGE_LEN], at: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&image[at..at + 4]);
    i32::from_le_bytes(raw)
}

/// Validated load/save of [`Settings`] on a flash record
pub struct SettingsStore<S> {
    storage: S,
}

impl<S: FlashStorage> SettingsStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Load settings, falling back to `defaults` field by field.
    ///
    /// Never fails: a missing, short or unreadable record yields `defaults`.
    pub async fn load(&mut self, defaults: Settings) -> Settings {
        let mut image = [0xFF; IMAGE_LEN];

        match self.storage.read(StorageKey::Settings, &mut image).await {
            Ok(len) if len >= IMAGE_LEN => {
                let settings = Settings::decode(&image, defaults);
                info!(
                    "settings loaded: offset {} s, brightness {}%",
                    settings.timezone_offset_s,
                    settings.brightness_pct
                );
                settings
            }
            Ok(len) => {
                warn!("settings record is {} bytes, using defaults", len);
                defaults
            }
            Err(FlashError::NotFound) => {
                info!("no stored settings, using defaults");
                defaults
            }
            Err(e) => {
                warn!("settings read failed: {:?}", e);
                defaults
            }
        }
    }

    /// Persist `settings` as-is; no range validation.
    pub async fn save(&mut self, settings: &Settings) -> Result<(), FlashError> {
        let mut image = [0xFF; IMAGE_LEN];

        match self.storage.read(StorageKey::Settings, &mut image).await {
            Ok(_) | Err(FlashError::NotFound) => {}
            Err(e) => {
                warn!("settings read before save failed: {:?}", e);
                image = [0xFF; IMAGE_LEN];
            }
        }

        settings.encode_into(&mut image);
        self.storage.write(StorageKey::Settings, &image).await?;

        info!(
            "settings saved: offset {} s, brightness {}%",
            settings.timezone_offset_s,
            settings.brightness_pct
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryFlash;
    use embassy_futures::block_on;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.timezone_offset_s, 28_800);
        assert_eq!(settings.brightness_pct, 100);
    }

    #[test]
    fn test_fresh_storage_loads_defaults() {
        let mut store = SettingsStore::new(MemoryFlash::default());
        let defaults = Settings {
            timezone_offset_s: 3600,
            brightness_pct: 40,
        };
        assert_eq!(block_on(store.load(defaults)), defaults);
    }

    #[test]
    fn test_read_error_loads_defaults() {
        let mut flash = MemoryFlash::default();
        flash.fail_reads = true;
        let mut store = SettingsStore::new(flash);
        assert_eq!(block_on(store.load(Settings::default())), Settings::default());
    }

    #[test]
    fn test_image_layout() {
        let mut store = SettingsStore::new(MemoryFlash::default());
        let settings = Settings {
            timezone_offset_s: -18_000,
            brightness_pct: 35,
        };
        block_on(store.save(&settings)).unwrap();

        let image = store.storage().record(StorageKey::Settings).unwrap();
        assert_eq!(image.len(), IMAGE_LEN);
        assert_eq!(image[0..4], (-18_000i32).to_le_bytes());
        assert_eq!(image[10..14], 35i32.to_le_bytes());
        assert!(image[4..10].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_save_preserves_other_bytes() {
        let mut flash = MemoryFlash::default();
        let mut image = [0u8; IMAGE_LEN];
        image[100] = 0xAB;
        image[511] = 0xCD;
        flash.insert(StorageKey::Settings, &image);

        let mut store = SettingsStore::new(flash);
        block_on(store.save(&Settings::default())).unwrap();

        let image = store.storage().record(StorageKey::Settings).unwrap();
        assert_eq!(image[100], 0xAB);
        assert_eq!(image[511], 0xCD);
    }

    #[test]
    fn test_out_of_range_fields_fall_back_independently() {
        let mut store = SettingsStore::new(MemoryFlash::default());
        block_on(store.save(&Settings {
            timezone_offset_s: -50_000,
            brightness_pct: 55,
        }))
        .unwrap();

        let loaded = block_on(store.load(Settings::default()));
        assert_eq!(loaded.timezone_offset_s, DEFAULT_TIMEZONE_OFFSET_S);
        assert_eq!(loaded.brightness_pct, 55);

        block_on(store.save(&Settings {
            timezone_offset_s: 7200,
            brightness_pct: 101,
        }))
        .unwrap();

        let loaded = block_on(store.load(Settings::default()));
        assert_eq!(loaded.timezone_offset_s, 7200);
        assert_eq!(loaded.brightness_pct, DEFAULT_BRIGHTNESS_PCT);
    }

    #[test]
    fn test_offset_bounds_are_exclusive() {
        assert!(!Settings::offset_in_range(-43_200));
        assert!(Settings::offset_in_range(-43_199));
        assert!(Settings::offset_in_range(50_399));
        assert!(!Settings::offset_in_range(50_400));
    }

    #[test]
    fn test_backlight_duty() {
        let duty = |brightness_pct| {
            Settings {
                timezone_offset_s: 0,
                brightness_pct,
            }
            .backlight_duty()
        };
        assert_eq!(duty(100), 0);
        assert_eq!(duty(0), 240);
        assert_eq!(duty(50), 120);
        assert_eq!(duty(1), 238);
        assert_eq!(duty(33), 161);
        assert_eq!(duty(150), 0);
        assert_eq!(duty(-20), 240);
        assert_eq!(duty(i32::MIN), 240);
    }

    proptest! {
        #[test]
        fn prop_valid_settings_round_trip(
            timezone_offset_s in -43_199i32..50_400,
            brightness_pct in 0i32..=100,
        ) {
            let settings = Settings { timezone_offset_s, brightness_pct };
            let mut store = SettingsStore::new(MemoryFlash::default());
            block_on(store.save(&settings)).unwrap();

            let defaults = Settings { timezone_offset_s: 1, brightness_pct: 2 };
            prop_assert_eq!(block_on(store.load(defaults)), settings);
        }
    }
}
