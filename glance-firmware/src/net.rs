//! CYW43 WiFi bring-up and the embassy-net stack

use cyw43::JoinOptions;
use cyw43_pio::{PioSpi, DEFAULT_CLOCK_DIVIDER};
use defmt::*;
use embassy_executor::Spawner;
use embassy_net::{Config, DhcpConfig, Stack, StackResources};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIN_23, PIN_24, PIN_25, PIN_29, PIO0};
use embassy_rp::pio::{InterruptHandler, Pio};
use embassy_rp::Peri;
use embassy_time::{Duration, Instant, Timer};
use glance_core::config::WifiConfig;
use glance_core::sync::Network;
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

/// Delay between join attempts
const JOIN_RETRY: Duration = Duration::from_millis(500);

/// WiFi chip pins on the Pico W
pub struct WifiPeripherals {
    pub pwr: Peri<'static, PIN_23>,
    pub cs: Peri<'static, PIN_25>,
    pub pio: Peri<'static, PIO0>,
    pub dio: Peri<'static, PIN_24>,
    pub clk: Peri<'static, PIN_29>,
    pub dma: Peri<'static, DMA_CH0>,
}

#[embassy_executor::task]
async fn cyw43_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

/// Power the radio and start the network stack. Does not join.
pub async fn bring_up(
    spawner: Spawner,
    peripherals: WifiPeripherals,
    wifi: &WifiConfig,
) -> (Stack<'static>, cyw43::Control<'static>) {
    let fw = include_bytes!("../cyw43-firmware/43439A0.bin");
    let clm = include_bytes!("../cyw43-firmware/43439A0_clm.bin");

    let pwr = Output::new(peripherals.pwr, Level::Low);
    let cs = Output::new(peripherals.cs, Level::High);
    let mut pio = Pio::new(peripherals.pio, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        peripherals.dio,
        peripherals.clk,
        peripherals.dma,
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    unwrap!(spawner.spawn(cyw43_task(runner)));

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;
    info!("WiFi chip initialized");

    let mut dhcp = DhcpConfig::default();
    dhcp.hostname = Some(wifi.hostname.clone());

    static RESOURCES: StaticCell<StackResources<6>> = StaticCell::new();
    let seed = Instant::now().as_micros();
    let (stack, runner) = embassy_net::new(
        net_device,
        Config::dhcpv4(dhcp),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    unwrap!(spawner.spawn(net_task(runner)));

    (stack, control)
}

/// Join the configured network, retrying until associated and addressed
pub async fn join(control: &mut cyw43::Control<'static>, stack: Stack<'static>, wifi: &WifiConfig) {
    info!("Joining WiFi network: {}", wifi.ssid.as_str());

    loop {
        let options = if wifi.password.is_empty() {
            JoinOptions::new_open()
        } else {
            JoinOptions::new(wifi.password.as_bytes())
        };

        match control.join(&wifi.ssid, options).await {
            Ok(()) => break,
            Err(err) => {
                warn!("WiFi join failed: {:?}, retrying...", err.status);
                Timer::after(JOIN_RETRY).await;
            }
        }
    }

    stack.wait_link_up().await;
    stack.wait_config_up().await;

    if let Some(config) = stack.config_v4() {
        info!("IP address: {}", config.address);
    }
}

/// Link state of the WiFi stack
#[derive(Clone, Copy)]
pub struct WifiLink {
    stack: Stack<'static>,
}

impl WifiLink {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }
}

impl Network for WifiLink {
    fn is_connected(&self) -> bool {
        self.stack.is_link_up() && self.stack.config_v4().is_some()
    }
}
