//! Board-agnostic core logic for the desk event display
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Event buffer and the render pipeline that paints it
//! - Feed parsing and the remote synchronizer
//! - Validated settings persistence
//! - Firmware update session state machine
//! - Cooperative scheduler and the owned [`Device`] it drives
//! - Web handlers for the settings page and firmware upload
//! - Device configuration parser

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

// Must come first so the logging macros are visible to every module below.
mod fmt;

pub mod clock;
pub mod config;
pub mod device;
pub mod event;
pub mod feed;
pub mod render;
pub mod scheduler;
pub mod settings;
pub mod sync;
pub mod update;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

pub use device::{Device, Parts, Platform};
