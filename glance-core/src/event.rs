//! Event buffer
//!
//! Eight fixed slots. A slot with an empty title is unused; the buffer
//! never grows and excess input is dropped.

use alloc::string::String;

use crate::render::Color;

/// Number of slots, and the most events a feed can contribute
pub const MAX_EVENTS: usize = 8;

/// Characters of a title that fit on a tile
pub const TITLE_CHARS: usize = 11;

/// Slots per grid column
const ROWS: usize = 4;

/// One calendar entry as shown on a tile
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    /// Full title; the tile shows the first [`TITLE_CHARS`] characters
    pub title: String,
    /// Pre-formatted time range, drawn verbatim
    pub time: String,
    /// Tile background
    pub color: Color,
    /// Dark backgrounds get light text
    pub is_dark: bool,
}

impl Event {
    /// True for an unused slot
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
    }
}

/// Grid position of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GridCell {
    pub column: u8,
    pub row: u8,
}

/// Slots fill the left column top to bottom, then the right one.
pub fn grid_cell(index: usize) -> GridCell {
    GridCell {
        column: (index / ROWS) as u8,
        row: (index % ROWS) as u8,
    }
}

/// Fixed-capacity, ordered event storage
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventBuffer {
    slots: [Event; MAX_EVENTS],
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty every slot
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = Event::default());
    }

    /// Copy `items` into the slots in order, starting at slot 0.
    ///
    /// Items beyond [`MAX_EVENTS`] are ignored. Returns how many slots were
    /// written.
    pub fn populate<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = Event>,
    {
        let mut written = 0;
        for (slot, item) in self.slots.iter_mut().zip(items) {
            *slot = item;
            written += 1;
        }
        written
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[Event; MAX_EVENTS] {
        &self.slots
    }

    /// Non-empty slots with their indices
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &Event)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, event)| !event.is_empty())
    }

    /// Number of non-empty slots
    pub fn len(&self) -> usize {
        self.occupied().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::vec::Vec;

    fn numbered(n: usize) -> Vec<Event> {
        (0..n)
            .map(|i| Event {
                title: format!("Event {i}"),
                time: format!("{i}:00"),
                color: Color(i as u16),
                is_dark: i % 2 == 0,
            })
            .collect()
    }

    #[test]
    fn test_new_buffer_is_empty() {
        let buffer = EventBuffer::new();
        assert!(buffer.is_empty());
        assert!(buffer.slots().iter().all(Event::is_empty));
    }

    #[test]
    fn test_populate_keeps_first_eight_in_order() {
        let mut buffer = EventBuffer::new();
        let items = numbered(12);

        assert_eq!(buffer.populate(items.clone()), MAX_EVENTS);
        assert_eq!(buffer.slots()[..], items[..MAX_EVENTS]);
    }

    #[test]
    fn test_populate_partial() {
        let mut buffer = EventBuffer::new();
        let items = numbered(3);

        assert_eq!(buffer.populate(items.clone()), 3);
        assert_eq!(buffer.slots()[..3], items[..]);
        assert!(buffer.slots()[3..].iter().all(Event::is_empty));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_clear() {
        let mut buffer = EventBuffer::new();
        buffer.populate(numbered(8));
        buffer.clear();
        assert_eq!(buffer, EventBuffer::new());
    }

    #[test]
    fn test_occupied_skips_blank_titles() {
        let mut buffer = EventBuffer::new();
        let mut items = numbered(4);
        items[1].title.clear();
        buffer.populate(items);

        let indices: Vec<usize> = buffer.occupied().map(|(i, _)| i).collect();
        assert_eq!(indices, [0, 2, 3]);
    }

    #[test]
    fn test_grid_cells() {
        assert_eq!(grid_cell(0), GridCell { column: 0, row: 0 });
        assert_eq!(grid_cell(3), GridCell { column: 0, row: 3 });
        assert_eq!(grid_cell(4), GridCell { column: 1, row: 0 });
        assert_eq!(grid_cell(5), GridCell { column: 1, row: 1 });
        assert_eq!(grid_cell(7), GridCell { column: 1, row: 3 });
    }
}
