//! Glance - desk event display firmware
//!
//! Main firmware binary for the Raspberry Pi Pico W with a 240x240 ST7789
//! panel. Pulls upcoming events over HTTPS, shows them next to a clock, and
//! serves a small settings and firmware-update page on port 80.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_rp::flash::{Flash, WRITE_SIZE};
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, Timer};
use embedded_alloc::LlffHeap as Heap;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use glance_core::config::{parse_config, DeviceConfig};
use glance_core::device::{Device, Parts, Platform};
use glance_core::web::Outcome;
use glance_hal_rp2040::{
    settings_partition, updater_config, DfuWriter, FlashPartition, PwmBacklight, SettingsFlash,
    SharedFlash,
};

use crate::clock::SntpClock;
use crate::display::{PanelCanvas, PanelPins};
use crate::http::{ReqwlessTransport, TcpState};
use crate::net::{WifiLink, WifiPeripherals};

mod clock;
mod display;
mod http;
mod net;

// Heap allocator for TLS buffers and feed bodies
#[global_allocator]
static HEAP: Heap = Heap::empty();

// Heap size: 96KB
const HEAP_SIZE: usize = 96 * 1024;

/// Embedded configuration (compiled into firmware)
/// Edit device.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../device.toml");

const HTTP_PORT: u16 = 80;
/// How long the listener waits for a client before the periodic duties run
const ACCEPT_WINDOW: Duration = Duration::from_millis(50);
/// Idle timeout for a web client connection
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
/// Time for the final response to drain before restarting
const RESTART_DELAY: Duration = Duration::from_millis(1000);

static FLASH: StaticCell<SharedFlash> = StaticCell::new();
static BOOT_STATE_BUF: StaticCell<[u8; WRITE_SIZE]> = StaticCell::new();
static TCP_STATE: StaticCell<TcpState> = StaticCell::new();

/// The Pico W board
struct Board;

impl Platform for Board {
    type Canvas = PanelCanvas;
    type Backlight = PwmBacklight<'static>;
    type Network = WifiLink;
    type Http = ReqwlessTransport;
    type Clock = SntpClock;
    type Storage = SettingsFlash<FlashPartition>;
    type Firmware = DfuWriter<'static, FlashPartition, FlashPartition>;
}

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Glance firmware starting...");

    // Initialize heap allocator
    init_heap();

    // Initialize RP2040 peripherals
    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();

    let flash: &'static SharedFlash = FLASH.init(Mutex::new(Flash::new(p.FLASH, p.DMA_CH1)));
    let mut firmware = DfuWriter::new(updater_config(flash), BOOT_STATE_BUF.init([0; WRITE_SIZE]));
    match firmware.mark_booted().await {
        Ok(true) => info!("Running freshly installed firmware"),
        Ok(false) => {}
        Err(e) => warn!("could not confirm boot, the bootloader may revert: {:?}", e),
    }

    let canvas = display::init(PanelPins {
        spi: p.SPI1,
        sck: p.PIN_10,
        mosi: p.PIN_11,
        cs: p.PIN_9,
        dc: p.PIN_8,
        rst: p.PIN_12,
    });
    let backlight = PwmBacklight::new(p.PWM_SLICE6, p.PIN_13);

    let (stack, mut control) = net::bring_up(
        spawner,
        WifiPeripherals {
            pwr: p.PIN_23,
            cs: p.PIN_25,
            pio: p.PIO0,
            dio: p.PIN_24,
            clk: p.PIN_29,
            dma: p.DMA_CH0,
        },
        &config.wifi,
    )
    .await;

    let parts = Parts::<Board> {
        canvas,
        backlight,
        network: WifiLink::new(stack),
        http: ReqwlessTransport::new(stack, TCP_STATE.init(TcpState::new())),
        clock: SntpClock::new(stack, config.clock.ntp_servers.clone()),
        storage: SettingsFlash::new(settings_partition(flash)),
        firmware,
    };

    let mut device = Device::new(parts, &config);
    device.start().await;
    info!("Settings: {}", device.settings());

    net::join(&mut control, stack, &config.wifi).await;
    device.online(now_ms()).await;
    info!("Online, serving on port {}", HTTP_PORT);

    serve_forever(stack, &mut device).await
}

/// Alternate between a short accept window and the periodic duties.
///
/// The listening socket only exists during the window, so at most one client
/// is handled at a time and nothing queues behind it.
async fn serve_forever(stack: Stack<'static>, device: &mut Device<Board>) -> ! {
    let mut rx_buffer = [0u8; 2048];
    let mut tx_buffer = [0u8; 2048];

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(CLIENT_TIMEOUT));

        match select(socket.accept(HTTP_PORT), Timer::after(ACCEPT_WINDOW)).await {
            Either::First(Ok(())) => {
                debug!("client {:?}", socket.remote_endpoint());
                let outcome = device.serve(&mut socket).await;
                socket.close();
                if let Err(e) = socket.flush().await {
                    debug!("flush on close failed: {:?}", e);
                }

                match outcome {
                    Ok(Outcome::Done) => {}
                    Ok(Outcome::Restart) => restart().await,
                    Err(e) => warn!("client dropped: {:?}", e),
                }
            }
            Either::First(Err(e)) => warn!("accept failed: {:?}", e),
            Either::Second(()) => {}
        }
        drop(socket);

        device.tick(now_ms()).await;
    }
}

async fn restart() -> ! {
    info!("Restarting...");
    Timer::after(RESTART_DELAY).await;
    cortex_m::peripheral::SCB::sys_reset()
}

/// Milliseconds since boot, wrapping
fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

fn load_config() -> DeviceConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Loaded device.toml");
            config
        }
        Err(e) => {
            warn!("device.toml rejected ({:?}), using defaults", e);
            DeviceConfig::default()
        }
    }
}

fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}
