//! Glance Hardware Abstraction Layer
//!
//! Traits for the pieces of hardware the display core talks to but never
//! drives directly. Chip-specific crates implement them; the core and its
//! host tests only ever see the traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  glance-core (device, sync, update)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  glance-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ glance-hal-   │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`flash::FlashStorage`] - Wear-levelled key/value records
//! - [`firmware::FirmwareWriter`] - Streaming writes of a new program image
//! - [`backlight::Backlight`] - Panel backlight PWM

#![no_std]
#![deny(unsafe_code)]

pub mod backlight;
pub mod firmware;
pub mod flash;

// Re-export key traits at crate root for convenience
pub use backlight::Backlight;
pub use firmware::{FirmwareError, FirmwareWriter, SectorBuffer};
pub use flash::{FlashError, FlashStorage, StorageKey};
