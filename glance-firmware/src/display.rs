//! ST7789 240x240 panel (Waveshare Pico-LCD-1.3 pinout)
//!
//! | Signal | Pin  |
//! |--------|------|
//! | SCK    | GP10 |
//! | MOSI   | GP11 |
//! | CS     | GP9  |
//! | DC     | GP8  |
//! | RST    | GP12 |
//! | BL     | GP13 |

use defmt::*;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{PIN_10, PIN_11, PIN_12, PIN_8, PIN_9, SPI1};
use embassy_rp::spi::{Blocking, Config as SpiConfig, Spi};
use embassy_rp::Peri;
use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_7X13_BOLD};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle, RoundedRectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use glance_core::render::{Anchor, Canvas, Color, Font, Point as CanvasPoint, Rect};
use mipidsi::interface::SpiInterface;
use mipidsi::models::ST7789;
use mipidsi::options::ColorInversion;
use mipidsi::Builder;
use static_cell::StaticCell;

const SPI_FREQUENCY_HZ: u32 = 62_500_000;

type PanelSpi = ExclusiveDevice<Spi<'static, SPI1, Blocking>, Output<'static>, NoDelay>;
type Panel = mipidsi::Display<SpiInterface<'static, PanelSpi, Output<'static>>, ST7789, Output<'static>>;

/// [`Canvas`] over any RGB565 draw target
pub struct PanelCanvas<D = Panel> {
    target: D,
}

/// Panel pins
pub struct PanelPins {
    pub spi: Peri<'static, SPI1>,
    pub sck: Peri<'static, PIN_10>,
    pub mosi: Peri<'static, PIN_11>,
    pub cs: Peri<'static, PIN_9>,
    pub dc: Peri<'static, PIN_8>,
    pub rst: Peri<'static, PIN_12>,
}

static SPI_BUFFER: StaticCell<[u8; 512]> = StaticCell::new();

/// Bring up the panel
pub fn init(pins: PanelPins) -> PanelCanvas {
    let mut config = SpiConfig::default();
    config.frequency = SPI_FREQUENCY_HZ;

    let spi = Spi::new_blocking_txonly(pins.spi, pins.sck, pins.mosi, config);
    let cs = Output::new(pins.cs, Level::High);
    let device = match ExclusiveDevice::new_no_delay(spi, cs) {
        Ok(device) => device,
        Err(never) => match never {},
    };

    let dc = Output::new(pins.dc, Level::Low);
    let rst = Output::new(pins.rst, Level::High);
    let interface = SpiInterface::new(device, dc, SPI_BUFFER.init([0; 512]));

    let panel = unwrap!(
        Builder::new(ST7789, interface)
            .reset_pin(rst)
            .display_size(240, 240)
            .invert_colors(ColorInversion::Inverted)
            .init(&mut embassy_time::Delay)
            .map_err(|_| "panel init failed")
    );
    info!("Panel initialized");

    PanelCanvas { target: panel }
}

fn rgb(color: Color) -> Rgb565 {
    Rgb565::from(RawU16::new(color.0))
}

fn bounds(rect: Rect) -> Rectangle {
    Rectangle::new(Point::new(rect.x, rect.y), Size::new(rect.width, rect.height))
}

fn font(font: Font) -> &'static MonoFont<'static> {
    match font {
        Font::Small => &FONT_7X13_BOLD,
        Font::Large => &FONT_10X20,
    }
}

fn placement(anchor: Anchor) -> (Alignment, Baseline) {
    match anchor {
        Anchor::TopLeft => (Alignment::Left, Baseline::Top),
        Anchor::MiddleLeft => (Alignment::Left, Baseline::Middle),
        Anchor::MiddleRight => (Alignment::Right, Baseline::Middle),
        Anchor::Center => (Alignment::Center, Baseline::Middle),
    }
}

impl<D: DrawTarget<Color = Rgb565>> Canvas for PanelCanvas<D> {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        if bounds(rect)
            .into_styled(PrimitiveStyle::with_fill(rgb(color)))
            .draw(&mut self.target)
            .is_err()
        {
            warn!("fill failed");
        }
    }

    fn fill_round_rect(&mut self, rect: Rect, radius: u32, color: Color) {
        if RoundedRectangle::with_equal_corners(bounds(rect), Size::new(radius, radius))
            .into_styled(PrimitiveStyle::with_fill(rgb(color)))
            .draw(&mut self.target)
            .is_err()
        {
            warn!("rounded fill failed");
        }
    }

    fn draw_text(&mut self, text: &str, at: CanvasPoint, anchor: Anchor, font: Font, color: Color) {
        let (alignment, baseline) = placement(anchor);
        let character_style = MonoTextStyle::new(self::font(font), rgb(color));
        let text_style = TextStyleBuilder::new()
            .alignment(alignment)
            .baseline(baseline)
            .build();

        if Text::with_text_style(text, Point::new(at.x, at.y), character_style, text_style)
            .draw(&mut self.target)
            .is_err()
        {
            warn!("text draw failed");
        }
    }
}
