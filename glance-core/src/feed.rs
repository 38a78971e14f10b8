//! Event feed parsing
//!
//! The feed is a JSON array of compact objects:
//!
//! ```json
//! [{"t": "Standup", "d": "09:30-09:45", "c": 2016, "isDark": false}]
//! ```
//!
//! `t` is the title, `d` the pre-formatted time, `c` an RGB565 color and
//! `isDark` picks the text colors. Unknown fields are ignored. Only the
//! first [`MAX_EVENTS`] elements are kept; the rest are checked for
//! well-formedness and skipped without allocating.

use alloc::string::String;
use core::fmt;

use heapless::Vec;
use serde::de::{Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::Deserialize;

use crate::event::{Event, MAX_EVENTS};
use crate::render::Color;

/// Parse a feed body into at most [`MAX_EVENTS`] events, in source order.
pub fn parse_feed(body: &[u8]) -> Result<Vec<Event, MAX_EVENTS>, serde_json::Error> {
    serde_json::from_slice::<Feed>(body).map(|feed| feed.0)
}

#[derive(Deserialize)]
struct Item {
    t: String,
    d: String,
    #[serde(deserialize_with = "color")]
    c: u16,
    #[serde(rename = "isDark")]
    is_dark: bool,
}

impl From<Item> for Event {
    fn from(item: Item) -> Self {
        Event {
            title: item.t,
            time: item.d,
            color: Color(item.c),
            is_dark: item.is_dark,
        }
    }
}

/// Integers outside the RGB565 range read as black.
fn color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(u16::try_from(raw).unwrap_or(0))
}

struct Feed(Vec<Event, MAX_EVENTS>);

impl<'de> Deserialize<'de> for Feed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(FeedVisitor)
    }
}

struct FeedVisitor;

impl<'de> Visitor<'de> for FeedVisitor {
    type Value = Feed;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of events")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Feed, A::Error> {
        let mut events = Vec::new();

        while !events.is_full() {
            let Some(item) = seq.next_element::<Item>()? else {
                return Ok(Feed(events));
            };
            // Cannot fail: loop condition guarantees room.
            let _ = events.push(Event::from(item));
        }

        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Feed(events))
    }
}
