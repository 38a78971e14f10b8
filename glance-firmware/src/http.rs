//! HTTPS GET over reqwless
//!
//! Certificates are not verified. Redirects are followed by hand since the
//! feed endpoint answers with a 302 to its content host.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use defmt::*;
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration, Instant};
use glance_core::sync::{HttpTransport, Response, TransportError};
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use reqwless::request::Method;

/// Redirect hops followed before the 3xx itself is returned
const MAX_REDIRECTS: usize = 5;

/// Connection refused / could not complete the handshake
const CONNECTION_REFUSED: i16 = -1;
/// Connection dropped mid-exchange
const CONNECTION_LOST: i16 = -5;
/// No complete response within the timeout
const READ_TIMEOUT: i16 = -11;

/// Largest TLS record plus overhead
const TLS_READ_LEN: usize = 16_640;
const TLS_WRITE_LEN: usize = 4096;
/// Response head plus body
const RESPONSE_LEN: usize = 8192;

pub type TcpState = TcpClientState<1, 4096, 4096>;

enum Step {
    Done(Response),
    Redirect(String),
}

/// [`HttpTransport`] on the WiFi stack
pub struct ReqwlessTransport {
    stack: Stack<'static>,
    tcp_state: &'static TcpState,
    tls_read: Vec<u8>,
    tls_write: Vec<u8>,
    response: Vec<u8>,
}

impl ReqwlessTransport {
    pub fn new(stack: Stack<'static>, tcp_state: &'static TcpState) -> Self {
        Self {
            stack,
            tcp_state,
            tls_read: vec![0; TLS_READ_LEN],
            tls_write: vec![0; TLS_WRITE_LEN],
            response: vec![0; RESPONSE_LEN],
        }
    }

    async fn fetch(&mut self, url: &str) -> Result<Response, TransportError> {
        let mut target = String::from(url);
        let mut hops = 0;

        loop {
            match self.exchange(&target, hops < MAX_REDIRECTS).await? {
                Step::Done(response) => return Ok(response),
                Step::Redirect(location) => {
                    debug!("redirect {} -> {}", hops, location.as_str());
                    hops += 1;
                    target = location;
                }
            }
        }
    }

    async fn exchange(&mut self, url: &str, follow: bool) -> Result<Step, TransportError> {
        let tcp = TcpClient::new(self.stack, self.tcp_state);
        let dns = DnsSocket::new(self.stack);
        let seed = Instant::now().as_ticks();
        let tls = TlsConfig::new(seed, &mut self.tls_read, &mut self.tls_write, TlsVerify::None);
        let mut client = HttpClient::new_with_tls(&tcp, &dns, tls);

        let mut request = client.request(Method::GET, url).await.map_err(|e| {
            warn!("connect to feed failed: {:?}", e);
            match e {
                reqwless::Error::InvalidUrl(_) => TransportError::Connect,
                _ => TransportError::Request(CONNECTION_REFUSED),
            }
        })?;

        let response = request.send(&mut self.response).await.map_err(|e| {
            warn!("request failed: {:?}", e);
            TransportError::Request(CONNECTION_LOST)
        })?;

        let status = i16::try_from(response.status.0).unwrap_or(i16::MAX);
        if follow && (300..400).contains(&status) {
            let location = response
                .headers()
                .find(|(name, _)| name.eq_ignore_ascii_case("location"))
                .and_then(|(_, value)| core::str::from_utf8(value).ok());
            if let Some(location) = location {
                return Ok(Step::Redirect(String::from(location)));
            }
        }

        let body = response.body().read_to_end().await.map_err(|e| {
            warn!("reading body failed: {:?}", e);
            TransportError::Request(CONNECTION_LOST)
        })?;

        Ok(Step::Done(Response {
            status,
            body: body.to_vec(),
        }))
    }
}

impl HttpTransport for ReqwlessTransport {
    async fn get(&mut self, url: &str, timeout_ms: u32) -> Result<Response, TransportError> {
        let timeout = Duration::from_millis(u64::from(timeout_ms));
        match with_timeout(timeout, self.fetch(url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("feed request timed out after {} ms", timeout_ms);
                Err(TransportError::Request(READ_TIMEOUT))
            }
        }
    }
}
