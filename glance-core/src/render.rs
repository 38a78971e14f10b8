//! Render pipeline
//!
//! The screen is 240×240 and split into two regions that are always
//! redrawn independently:
//!
//! ```text
//! y=0   ┌──────────────────────────────┐
//!       │ Jan 05                 14:32 │  clock band
//! y=30  ├──────────────┬───────────────┤
//!       │  slot 0      │  slot 4       │
//!       │  slot 1      │  slot 5       │  event grid
//!       │  slot 2      │  slot 6       │
//!       │  slot 3      │  slot 7       │
//! y=240 └──────────────┴───────────────┘
//! ```
//!
//! Drawing goes through the [`Canvas`] trait; nothing here knows about the
//! panel controller or font rasterisation.

use crate::clock::ClockFace;
use crate::event::{grid_cell, EventBuffer, TITLE_CHARS};

pub const SCREEN_WIDTH: u32 = 240;
pub const SCREEN_HEIGHT: u32 = 240;

/// Height of the clock band at the top of the screen
pub const CLOCK_BAND_HEIGHT: u32 = 30;

/// Region holding the event grid; cleared before every grid or error draw
pub const GRID: Rect = Rect::new(
    0,
    CLOCK_BAND_HEIGHT as i32,
    SCREEN_WIDTH,
    SCREEN_HEIGHT - CLOCK_BAND_HEIGHT,
);

/// The clock band itself
pub const CLOCK_BAND: Rect = Rect::new(0, 0, SCREEN_WIDTH, CLOCK_BAND_HEIGHT);
const SCREEN: Rect = Rect::new(0, 0, SCREEN_WIDTH, SCREEN_HEIGHT);
const CENTER: Point = Point::new(120, 120);

const SLOT_WIDTH: u32 = 114;
const SLOT_HEIGHT: u32 = 45;
const SLOT_RADIUS: u32 = 6;
const COLUMN_PITCH: i32 = 120;
const ROW_PITCH: i32 = 49;

/// RGB565 color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Color(pub u16);

impl Color {
    pub const BLACK: Color = Color(0x0000);
    pub const WHITE: Color = Color(0xFFFF);
    pub const RED: Color = Color(0xF800);
    /// Clock band background
    pub const SLATE: Color = Color(0x18E3);
    /// Time text on dark event tiles
    pub const SILVER: Color = Color(0xCE79);
    /// Time text on light event tiles
    pub const GRAPHITE: Color = Color(0x3186);
}

/// Pixel position, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Text size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Font {
    /// Tile titles and times (~16 px line)
    Small,
    /// Clock, splash and error messages (~26 px line)
    Large,
}

/// Which point of the text box the draw position refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Anchor {
    TopLeft,
    MiddleLeft,
    MiddleRight,
    Center,
}

/// Drawing primitives provided by the display driver
pub trait Canvas {
    /// Fill `rect` with a solid color
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Fill `rect` with rounded corners of `radius`
    fn fill_round_rect(&mut self, rect: Rect, radius: u32, color: Color);

    /// Draw `text` so that its `anchor` point lands on `at`
    fn draw_text(&mut self, text: &str, at: Point, anchor: Anchor, font: Font, color: Color);
}

/// Longest prefix of `text` with at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Draw every occupied slot of `events` into the grid.
///
/// Only the grid region is touched; the clock band is left alone.
pub fn render_events<C: Canvas>(canvas: &mut C, events: &EventBuffer) {
    canvas.fill_rect(GRID, Color::BLACK);

    for (index, event) in events.occupied() {
        let cell = grid_cell(index);
        let x = i32::from(cell.column) * COLUMN_PITCH + 3;
        let y = 34 + i32::from(cell.row) * ROW_PITCH;

        canvas.fill_round_rect(
            Rect::new(x, y, SLOT_WIDTH, SLOT_HEIGHT),
            SLOT_RADIUS,
            event.color,
        );

        let (title_color, time_color) = if event.is_dark {
            (Color::WHITE, Color::SILVER)
        } else {
            (Color::BLACK, Color::GRAPHITE)
        };

        canvas.draw_text(
            truncate_chars(&event.title, TITLE_CHARS),
            Point::new(x + 5, y + 4),
            Anchor::TopLeft,
            Font::Small,
            title_color,
        );
        canvas.draw_text(
            &event.time,
            Point::new(x + 5, y + 26),
            Anchor::TopLeft,
            Font::Small,
            time_color,
        );
    }
}

/// Replace the grid with a single centred error message
pub fn render_error<C: Canvas>(canvas: &mut C, message: &str) {
    canvas.fill_rect(GRID, Color::BLACK);
    canvas.draw_text(message, CENTER, Anchor::Center, Font::Large, Color::RED);
}

/// Redraw the clock band
pub fn render_clock<C: Canvas>(canvas: &mut C, face: &ClockFace) {
    canvas.fill_rect(CLOCK_BAND, Color::SLATE);
    canvas.draw_text(
        &face.time,
        Point::new(235, 15),
        Anchor::MiddleRight,
        Font::Large,
        Color::WHITE,
    );
    if let Some(date) = &face.date {
        canvas.draw_text(
            date,
            Point::new(5, 15),
            Anchor::MiddleLeft,
            Font::Large,
            Color::WHITE,
        );
    }
}

/// Clear the whole screen and centre `text` on it
pub fn render_splash<C: Canvas>(canvas: &mut C, text: &str) {
    clear_screen(canvas);
    canvas.draw_text(text, CENTER, Anchor::Center, Font::Large, Color::WHITE);
}

pub fn clear_screen<C: Canvas>(canvas: &mut C) {
    canvas.fill_rect(SCREEN, Color::BLACK);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::testing::{Draw, RecordingCanvas};

    fn event(title: &str, time: &str, color: u16, is_dark: bool) -> Event {
        Event {
            title: title.into(),
            time: time.into(),
            color: Color(color),
            is_dark,
        }
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("Standup", 11), "Standup");
        assert_eq!(truncate_chars("Quarterly planning", 11), "Quarterly p");
        assert_eq!(truncate_chars("Café über alles", 6), "Café ü");
        assert_eq!(truncate_chars("", 11), "");
    }

    #[test]
    fn test_empty_buffer_only_clears_grid() {
        let mut canvas = RecordingCanvas::default();
        render_events(&mut canvas, &EventBuffer::new());

        assert_eq!(canvas.draws, [Draw::Fill(GRID, Color::BLACK)]);
    }

    #[test]
    fn test_tile_geometry_and_colors() {
        let mut events = EventBuffer::new();
        events.populate((0..6).map(|i| {
            if i == 5 {
                event("Quarterly planning", "14:00-15:00", 0x001F, true)
            } else {
                event("x", "", 0x07E0, false)
            }
        }));

        let mut canvas = RecordingCanvas::default();
        render_events(&mut canvas, &events);

        // Slot 5: column 1, row 1.
        assert!(canvas.draws.contains(&Draw::RoundRect(
            Rect::new(123, 83, 114, 45),
            6,
            Color(0x001F)
        )));
        assert!(canvas.draws.contains(&Draw::Text(
            "Quarterly p".into(),
            Point::new(128, 87),
            Anchor::TopLeft,
            Font::Small,
            Color::WHITE
        )));
        assert!(canvas.draws.contains(&Draw::Text(
            "14:00-15:00".into(),
            Point::new(128, 109),
            Anchor::TopLeft,
            Font::Small,
            Color::SILVER
        )));

        // Slot 0 is light.
        assert!(canvas.draws.contains(&Draw::Text(
            "x".into(),
            Point::new(8, 38),
            Anchor::TopLeft,
            Font::Small,
            Color::BLACK
        )));
    }

    #[test]
    fn test_render_never_touches_clock_band() {
        let mut events = EventBuffer::new();
        events.populate((0..8).map(|_| event("Busy", "all day", 0xFFE0, false)));

        let mut canvas = RecordingCanvas::default();
        render_events(&mut canvas, &events);
        render_error(&mut canvas, "WiFi Lost");

        for draw in &canvas.draws {
            assert!(draw.top() >= 30, "{draw:?} reaches into the clock band");
        }
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut events = EventBuffer::new();
        events.populate([event("Lunch", "12:00", 0xF81F, true)]);

        let mut first = RecordingCanvas::default();
        render_events(&mut first, &events);
        let mut second = RecordingCanvas::default();
        render_events(&mut second, &events);
        render_events(&mut second, &events);

        assert_eq!(second.draws[..first.draws.len()], first.draws[..]);
        assert_eq!(second.draws[first.draws.len()..], first.draws[..]);
    }

    #[test]
    fn test_error_message() {
        let mut canvas = RecordingCanvas::default();
        render_error(&mut canvas, "Connect Fail");

        assert_eq!(
            canvas.draws,
            [
                Draw::Fill(GRID, Color::BLACK),
                Draw::Text(
                    "Connect Fail".into(),
                    Point::new(120, 120),
                    Anchor::Center,
                    Font::Large,
                    Color::RED
                ),
            ]
        );
    }

    #[test]
    fn test_clock_band() {
        let mut canvas = RecordingCanvas::default();
        render_clock(&mut canvas, &ClockFace::unset());

        assert_eq!(canvas.draws[0], Draw::Fill(CLOCK_BAND, Color::SLATE));
        assert_eq!(canvas.texts(), ["--:--"]);
    }
}
