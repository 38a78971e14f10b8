//! Server-side HTTP/1.x for the Glance settings page
//!
//! Just enough HTTP to serve a single form page and accept its two POST
//! targets on a microcontroller, without an allocator:
//!
//! - [`head`] parses the request line and the few headers the device cares
//!   about (`Content-Length`, `Content-Type`).
//! - [`form`] decodes `application/x-www-form-urlencoded` pairs.
//! - [`multipart`] streams a `multipart/form-data` body chunk by chunk, so
//!   a firmware image never has to fit in RAM.
//! - [`response`] writes status lines and headers.
//!
//! # Request flow
//!
//! ```text
//! socket bytes ──► head::parse_head ──► route
//!                                        │
//!                 ┌──────────────────────┼───────────────────┐
//!                 ▼                      ▼                   ▼
//!            GET /  (page)      POST /set (form)    POST /update (multipart)
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod form;
pub mod head;
pub mod multipart;
pub mod response;

pub use head::{parse_head, HeadError, Method, RequestHead, MAX_HEAD_LEN};
pub use multipart::{MultipartError, MultipartParser, Part};
pub use response::{ResponseHead, Status};
