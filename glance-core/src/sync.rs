//! Remote event synchronizer
//!
//! One synchronization is: check the link, GET the feed, parse it, and
//! either repaint the grid or replace it with an error message. Failures
//! end the cycle; the next one is simply the next scheduled run.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::future::Future;

use crate::event::EventBuffer;
use crate::feed::parse_feed;
use crate::render::{render_error, render_events, Canvas};

/// Maximum feed URL length
pub const MAX_URL_LEN: usize = 256;

/// Default request timeout
pub const DEFAULT_TIMEOUT_MS: u32 = 15_000;

/// Link state as seen by the core
pub trait Network {
    fn is_connected(&self) -> bool;
}

/// A completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code of the final response after redirects
    pub status: i16,
    pub body: Vec<u8>,
}

/// Transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Could not open a connection to the host
    Connect,
    /// The exchange failed after connecting.
    ///
    /// Codes follow the usual embedded HTTP client numbering: -1 connection
    /// refused, -4 not connected, -5 connection lost, -11 read timeout.
    Request(i16),
}

/// HTTPS GET with redirect following
pub trait HttpTransport {
    fn get(
        &mut self,
        url: &str,
        timeout_ms: u32,
    ) -> impl Future<Output = Result<Response, TransportError>>;
}

/// Why a synchronization did not update the grid.
///
/// The `Display` text is what appears on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    NetworkUnavailable,
    ConnectFailure,
    /// Non-positive transport code
    HttpStatus(i16),
    /// Parser message
    Parse(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::NetworkUnavailable => f.write_str("WiFi Lost"),
            SyncError::ConnectFailure => f.write_str("Connect Fail"),
            SyncError::HttpStatus(code) => write!(f, "HTTP {code}"),
            SyncError::Parse(message) => write!(f, "JSON: {message}"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SyncError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SyncError::NetworkUnavailable => defmt::write!(f, "NetworkUnavailable"),
            SyncError::ConnectFailure => defmt::write!(f, "ConnectFailure"),
            SyncError::HttpStatus(code) => defmt::write!(f, "HttpStatus({})", code),
            SyncError::Parse(message) => defmt::write!(f, "Parse({=str})", message.as_str()),
        }
    }
}

impl From<TransportError> for SyncError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Connect => SyncError::ConnectFailure,
            TransportError::Request(code) => SyncError::HttpStatus(code),
        }
    }
}

/// Fetches the feed into an [`EventBuffer`]
pub struct Synchronizer<H> {
    http: H,
    url: heapless::String<MAX_URL_LEN>,
    timeout_ms: u32,
}

impl<H: HttpTransport> Synchronizer<H> {
    pub fn new(http: H, url: heapless::String<MAX_URL_LEN>, timeout_ms: u32) -> Self {
        Self {
            http,
            url,
            timeout_ms,
        }
    }

    pub fn transport(&self) -> &H {
        &self.http
    }

    /// Run one synchronization and paint its outcome.
    ///
    /// On success the buffer holds the new events and the grid shows them;
    /// the count is returned. On failure the buffer is untouched and the
    /// grid shows the error text.
    pub async fn synchronize<N, C>(
        &mut self,
        network: &N,
        events: &mut EventBuffer,
        canvas: &mut C,
    ) -> Result<usize, SyncError>
    where
        N: Network,
        C: Canvas,
    {
        let outcome = self.refresh(network, events).await;
        match &outcome {
            Ok(_) => render_events(canvas, events),
            Err(e) => render_error(canvas, &e.to_string()),
        }
        outcome
    }

    async fn refresh<N: Network>(
        &mut self,
        network: &N,
        events: &mut EventBuffer,
    ) -> Result<usize, SyncError> {
        if !network.is_connected() {
            return Err(SyncError::NetworkUnavailable);
        }
        if self.url.is_empty() {
            warn!("no feed url configured");
            return Err(SyncError::ConnectFailure);
        }

        let response = self.http.get(&self.url, self.timeout_ms).await?;
        if response.status <= 0 {
            return Err(SyncError::HttpStatus(response.status));
        }
        if !(200..300).contains(&response.status) {
            warn!("feed answered HTTP {}, parsing anyway", response.status);
        }

        let items = parse_feed(&response.body).map_err(|e| SyncError::Parse(e.to_string()))?;

        events.clear();
        Ok(events.populate(items))
    }
}
