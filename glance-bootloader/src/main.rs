//! Glance bootloader
//!
//! Lives in the first 24 KiB of flash. On a reset that follows a finished
//! upload it swaps the DFU partition into the active slot, then jumps to
//! the application. An application that never confirms itself with
//! `mark_booted` is swapped back out on the following reset.

#![no_std]
#![no_main]

use core::cell::RefCell;

use cortex_m_rt::{entry, exception, ExceptionFrame};
use defmt::*;
use embassy_boot_rp::{BootLoader, BootLoaderConfig, WatchdogFlash};
use embassy_rp::flash::FLASH_BASE;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Duration;
use {defmt_rtt as _, panic_probe as _};

/// Total flash on the Pico W
const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// A swap that stalls longer than this resets and resumes
const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(8);

#[entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());

    let flash = WatchdogFlash::<FLASH_SIZE>::start(p.FLASH, p.WATCHDOG, WATCHDOG_TIMEOUT);
    let flash = Mutex::new(RefCell::new(flash));

    let config = BootLoaderConfig::from_linkerfile_blocking(&flash, &flash, &flash);
    let active_offset = config.active.offset();
    let bootloader: BootLoader = BootLoader::prepare(config);

    info!("Booting application at {:#x}", active_offset);
    unsafe { bootloader.load(FLASH_BASE as u32 + active_offset) }
}

#[exception]
unsafe fn HardFault(_frame: &ExceptionFrame) -> ! {
    cortex_m::peripheral::SCB::sys_reset()
}
