//! The device and its cooperative main loop
//!
//! [`Device`] owns every piece of application state: settings, the event
//! buffer, the scheduler, and the hardware behind the [`Platform`] traits.
//! The firmware's main loop calls into it and nothing else mutates it:
//!
//! ```text
//! start ─► (join network) ─► online ─► loop {
//!                                        serve one request, if any
//!                                        tick: clock redraw / feed sync
//!                                      }
//! ```

use glance_hal::{Backlight, FirmwareWriter, FlashStorage};

use crate::clock::{ClockFace, TimeSource};
use crate::config::DeviceConfig;
use crate::event::EventBuffer;
use crate::render::{clear_screen, render_clock, render_events, render_splash, Canvas};
use crate::scheduler::Scheduler;
use crate::settings::{Settings, SettingsStore};
use crate::sync::{HttpTransport, Network, SyncError, Synchronizer};

/// Text shown while the network comes up
pub const CONNECTING: &str = "Connecting...";

/// Hardware and services a board provides
pub trait Platform {
    type Canvas: Canvas;
    type Backlight: Backlight;
    type Network: Network;
    type Http: HttpTransport;
    type Clock: TimeSource;
    type Storage: FlashStorage;
    type Firmware: FirmwareWriter;
}

/// Platform parts handed to [`Device::new`]
pub struct Parts<P: Platform> {
    pub canvas: P::Canvas,
    pub backlight: P::Backlight,
    pub network: P::Network,
    pub http: P::Http,
    pub clock: P::Clock,
    pub storage: P::Storage,
    pub firmware: P::Firmware,
}

/// Settings fields submitted from the web form. `None` keeps the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SettingsUpdate {
    pub timezone_offset_s: Option<i32>,
    pub brightness_pct: Option<i32>,
}

/// Application state plus the hardware it drives
pub struct Device<P: Platform> {
    pub(crate) canvas: P::Canvas,
    pub(crate) backlight: P::Backlight,
    pub(crate) network: P::Network,
    pub(crate) clock: P::Clock,
    pub(crate) firmware: P::Firmware,
    pub(crate) store: SettingsStore<P::Storage>,
    pub(crate) synchronizer: Synchronizer<P::Http>,
    pub(crate) events: EventBuffer,
    pub(crate) settings: Settings,
    pub(crate) defaults: Settings,
    pub(crate) scheduler: Scheduler,
}

impl<P: Platform> Device<P> {
    pub fn new(parts: Parts<P>, config: &DeviceConfig) -> Self {
        Self {
            canvas: parts.canvas,
            backlight: parts.backlight,
            network: parts.network,
            clock: parts.clock,
            firmware: parts.firmware,
            store: SettingsStore::new(parts.storage),
            synchronizer: Synchronizer::new(
                parts.http,
                config.feed.url.clone(),
                config.feed.timeout_ms,
            ),
            events: EventBuffer::new(),
            settings: config.settings,
            defaults: config.settings,
            scheduler: Scheduler::new(config.clock.refresh_ms, config.feed.refresh_ms),
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn events(&self) -> &EventBuffer {
        &self.events
    }

    /// First boot stage, before the network is up: load settings, light
    /// the panel and show the connecting splash.
    pub async fn start(&mut self) {
        self.settings = self.store.load(self.defaults).await;
        self.apply_backlight();
        render_splash(&mut self.canvas, CONNECTING);
    }

    /// Second boot stage, once the network is joined.
    ///
    /// Both periodic duties are armed at `now_ms`.
    pub async fn online(&mut self, now_ms: u32) {
        clear_screen(&mut self.canvas);
        self.clock.configure(self.settings.timezone_offset_s).await;
        render_events(&mut self.canvas, &self.events);
        let _ = self.synchronize().await;
        self.scheduler.arm(now_ms);
    }

    /// Run whatever periodic duties are due at `now_ms`
    pub async fn tick(&mut self, now_ms: u32) {
        let due = self.scheduler.poll(now_ms);

        if due.clock {
            self.redraw_clock();
        }

        if due.sync {
            if self.clock.local_now().is_none() {
                // Time never synced; the previous attempt may have raced the
                // link coming up.
                self.clock.configure(self.settings.timezone_offset_s).await;
            }
            let _ = self.synchronize().await;
        }
    }

    /// Fetch the feed and repaint the grid (or the error)
    pub async fn synchronize(&mut self) -> Result<usize, SyncError> {
        let outcome = self
            .synchronizer
            .synchronize(&self.network, &mut self.events, &mut self.canvas)
            .await;

        match &outcome {
            Ok(count) => info!("sync: {} events", count),
            Err(e) => warn!("sync failed: {:?}", e),
        }
        outcome
    }

    pub fn redraw_clock(&mut self) {
        let face = ClockFace::new(self.clock.local_now());
        render_clock(&mut self.canvas, &face);
    }

    /// Apply form-submitted settings.
    ///
    /// Submitted values are kept in memory exactly as given, persisted
    /// without validation, and take effect on the backlight and clock at
    /// once. Range checks only happen on the next load.
    pub async fn apply_settings(&mut self, update: SettingsUpdate) {
        if let Some(offset) = update.timezone_offset_s {
            self.settings.timezone_offset_s = offset;
        }
        if let Some(brightness) = update.brightness_pct {
            self.settings.brightness_pct = brightness;
        }

        if let Err(e) = self.store.save(&self.settings).await {
            error!("settings save failed: {:?}", e);
        }
        self.apply_backlight();
        self.clock.configure(self.settings.timezone_offset_s).await;
    }

    fn apply_backlight(&mut self) {
        let duty = self.settings.backlight_duty();
        debug!("backlight duty {}", duty);
        self.backlight.set_duty(duty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Anchor, Color, Font, Point, CLOCK_BAND, GRID};
    use crate::settings::{DEFAULT_TIMEZONE_OFFSET_S, IMAGE_LEN};
    use crate::sync::{Response, TransportError};
    use crate::testing::{device, parts, Draw, ScriptedHttp, TestPlatform};
    use embassy_futures::block_on;
    use glance_hal::StorageKey;

    const FEED: &str = r#"[{"t":"Standup","d":"09:30","c":2016,"isDark":false}]"#;

    fn ok(body: &str) -> Result<Response, TransportError> {
        Ok(Response {
            status: 200,
            body: body.as_bytes().to_vec(),
        })
    }

    #[test]
    fn test_start_loads_settings_and_shows_splash() {
        let mut parts = parts(ScriptedHttp::new([]));
        let mut image = [0xFFu8; IMAGE_LEN];
        image[0..4].copy_from_slice(&3600i32.to_le_bytes());
        image[10..14].copy_from_slice(&50i32.to_le_bytes());
        parts.storage.insert(StorageKey::Settings, &image);

        let mut device: Device<TestPlatform> = Device::new(parts, &DeviceConfig::default());
        block_on(device.start());

        assert_eq!(
            device.settings(),
            Settings {
                timezone_offset_s: 3600,
                brightness_pct: 50
            }
        );
        assert_eq!(device.backlight.duties, [120]);
        assert_eq!(device.canvas.texts(), [CONNECTING]);
        assert_eq!(
            device.canvas.draws[1],
            Draw::Text(
                CONNECTING.into(),
                Point::new(120, 120),
                Anchor::Center,
                Font::Large,
                Color::WHITE
            )
        );
    }

    #[test]
    fn test_online_syncs_and_arms_timers() {
        let mut device = device(ScriptedHttp::new([ok(FEED)]));
        block_on(async {
            device.start().await;
            device.online(1_000).await;
        });

        assert_eq!(device.clock.configured, [DEFAULT_TIMEZONE_OFFSET_S]);
        assert_eq!(device.events().len(), 1);
        assert!(device.canvas.texts().contains(&"Standup"));
        assert!(!device.scheduler.poll(1_999).clock);
        assert!(device.scheduler.poll(2_000).clock);
    }

    #[test]
    fn test_tick_redraws_clock_then_syncs() {
        let mut device = device(ScriptedHttp::new([ok(FEED), ok("[]")]));
        block_on(async {
            device.start().await;
            device.online(0).await;
        });
        device.canvas.draws.clear();

        block_on(device.tick(500));
        assert!(device.canvas.draws.is_empty());

        block_on(device.tick(1_000));
        assert_eq!(device.canvas.texts(), ["--:--"]);

        device.canvas.draws.clear();
        block_on(device.tick(120_000));
        assert_eq!(device.canvas.draws[0], Draw::Fill(CLOCK_BAND, Color::SLATE));
        assert!(device.canvas.draws.contains(&Draw::Fill(GRID, Color::BLACK)));
        assert!(device.events().is_empty());
        // Clock never synced, so it was asked again before the feed.
        assert_eq!(device.clock.configured.len(), 2);
    }

    #[test]
    fn test_synced_clock_is_not_reconfigured() {
        let mut device = device(ScriptedHttp::new([ok(FEED), ok(FEED)]));
        device.clock.synced = true;
        block_on(async {
            device.start().await;
            device.online(0).await;
            device.tick(120_000).await;
        });
        assert_eq!(device.clock.configured.len(), 1);
    }

    #[test]
    fn test_apply_settings_keeps_raw_values_in_memory() {
        let mut device = device(ScriptedHttp::new([]));
        block_on(device.start());

        block_on(device.apply_settings(SettingsUpdate {
            timezone_offset_s: Some(-50_000),
            brightness_pct: None,
        }));

        assert_eq!(device.settings().timezone_offset_s, -50_000);
        assert_eq!(device.settings().brightness_pct, 100);
        assert_eq!(device.clock.configured, [-50_000]);
        assert_eq!(device.backlight.duties, [0, 0]);

        // The rejected offset does not survive a reload.
        block_on(device.start());
        assert_eq!(device.settings().timezone_offset_s, DEFAULT_TIMEZONE_OFFSET_S);
    }

    #[test]
    fn test_apply_settings_save_failure_still_applies() {
        let mut device = device(ScriptedHttp::new([]));
        device.store.storage_mut().fail_writes = true;

        block_on(device.apply_settings(SettingsUpdate {
            timezone_offset_s: None,
            brightness_pct: Some(0),
        }));

        assert_eq!(device.settings().brightness_pct, 0);
        assert_eq!(device.backlight.duties, [240]);
    }
}
