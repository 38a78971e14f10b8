//! RP2040 implementations of the `glance-hal` traits
//!
//! - [`flash::SettingsFlash`] - settings records in the last 64 KiB
//! - [`update::DfuWriter`] - firmware images staged for the bootloader swap
//! - [`backlight::PwmBacklight`] - backlight dimming on a PWM slice
//!
//! # Flash layout (2 MiB)
//!
//! ```text
//! 0x000000 ┌────────────────────────┐
//!          │ boot2 + bootloader     │  24 KiB
//! 0x006000 ├────────────────────────┤
//!          │ bootloader state       │  4 KiB
//! 0x007000 ├────────────────────────┤
//!          │ active application     │  960 KiB
//! 0x0F7000 ├────────────────────────┤
//!          │ DFU staging            │  964 KiB
//! 0x1E8000 ├────────────────────────┤
//!          │ (unused)               │  32 KiB
//! 0x1F0000 ├────────────────────────┤
//!          │ settings records       │  64 KiB
//! 0x200000 └────────────────────────┘
//! ```
//!
//! The bootloader regions come from the linker script (`memory.x`), the
//! settings partition from [`SETTINGS_OFFSET`]. Every partition shares the
//! one `FLASH` peripheral through a [`SharedFlash`] mutex.

#![no_std]

pub mod backlight;
pub mod flash;
pub mod update;

use embassy_boot_rp::FirmwareUpdaterConfig;
use embassy_embedded_hal::flash::partition::Partition;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

pub use backlight::PwmBacklight;
pub use flash::SettingsFlash;
pub use update::DfuWriter;

/// Total flash on the Pico W
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

pub const SETTINGS_OFFSET: u32 = 0x1F_0000;
pub const SETTINGS_SIZE: u32 = 0x1_0000;

/// The flash driver, shared between partitions
pub type SharedFlash = Mutex<CriticalSectionRawMutex, Flash<'static, FLASH, Async, FLASH_SIZE>>;

/// A window onto [`SharedFlash`]; offsets are relative to its start
pub type FlashPartition = Partition<'static, CriticalSectionRawMutex, Flash<'static, FLASH, Async, FLASH_SIZE>>;

/// Settings partition
pub fn settings_partition(flash: &'static SharedFlash) -> FlashPartition {
    Partition::new(flash, SETTINGS_OFFSET, SETTINGS_SIZE)
}

/// DFU and bootloader state partitions, as placed by the linker script
pub fn updater_config(flash: &'static SharedFlash) -> FirmwareUpdaterConfig<FlashPartition, FlashPartition> {
    FirmwareUpdaterConfig::from_linkerfile(flash, flash)
}
