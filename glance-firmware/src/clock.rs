//! SNTP-backed wall clock

use core::net::{IpAddr, SocketAddr};

use defmt::*;
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration, Instant};
use glance_core::clock::{local_time, TimeSource};
use glance_core::config::{MAX_HOST_LEN, MAX_NTP_SERVERS};
use heapless::{String, Vec};
use jiff::civil::DateTime;
use jiff::Timestamp;
use sntpc::{get_time, NtpContext, NtpTimestampGenerator};

const NTP_PORT: u16 = 123;
const NTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy)]
struct UptimeTimestamps {
    start: Instant,
}

impl NtpTimestampGenerator for UptimeTimestamps {
    fn init(&mut self) {
        self.start = Instant::now();
    }

    fn timestamp_sec(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    fn timestamp_subsec_micros(&self) -> u32 {
        (self.start.elapsed().as_micros() % 1_000_000) as u32
    }
}

/// Unix time anchored to an uptime instant
#[derive(Clone, Copy)]
struct Anchor {
    unix_s: i64,
    at: Instant,
}

/// Wall clock synced over SNTP on every [`TimeSource::configure`]
pub struct SntpClock {
    stack: Stack<'static>,
    servers: Vec<String<MAX_HOST_LEN>, MAX_NTP_SERVERS>,
    offset_s: i32,
    anchor: Option<Anchor>,
}

impl SntpClock {
    pub fn new(stack: Stack<'static>, servers: Vec<String<MAX_HOST_LEN>, MAX_NTP_SERVERS>) -> Self {
        Self {
            stack,
            servers,
            offset_s: 0,
            anchor: None,
        }
    }

    async fn query(&self, server: &str) -> Option<i64> {
        let addrs = match self.stack.dns_query(server, DnsQueryType::A).await {
            Ok(addrs) => addrs,
            Err(e) => {
                warn!("DNS query for {} failed: {:?}", server, e);
                return None;
            }
        };
        let addr: IpAddr = (*addrs.first()?).into();

        let mut rx_meta = [PacketMetadata::EMPTY; 1];
        let mut rx_buffer = [0u8; 128];
        let mut tx_meta = [PacketMetadata::EMPTY; 1];
        let mut tx_buffer = [0u8; 128];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        if let Err(e) = socket.bind(NTP_PORT) {
            warn!("NTP socket bind failed: {:?}", e);
            return None;
        }

        let context = NtpContext::new(UptimeTimestamps {
            start: Instant::now(),
        });
        match with_timeout(
            NTP_TIMEOUT,
            get_time(SocketAddr::from((addr, NTP_PORT)), &socket, context),
        )
        .await
        {
            Ok(Ok(result)) => Some(i64::from(result.sec())),
            Ok(Err(_)) => {
                warn!("NTP request to {} failed", server);
                None
            }
            Err(_) => {
                warn!("NTP request to {} timed out", server);
                None
            }
        }
    }
}

impl TimeSource for SntpClock {
    async fn configure(&mut self, offset_s: i32) {
        self.offset_s = offset_s;

        for index in 0..self.servers.len() {
            let server = self.servers[index].clone();
            if let Some(unix_s) = self.query(&server).await {
                info!("NTP time from {}: {}", server.as_str(), unix_s);
                self.anchor = Some(Anchor {
                    unix_s,
                    at: Instant::now(),
                });
                return;
            }
        }
        if self.anchor.is_none() {
            warn!("no NTP server answered, clock unset");
        } else {
            warn!("no NTP server answered, keeping previous sync");
        }
    }

    fn local_now(&self) -> Option<DateTime> {
        let anchor = self.anchor?;
        let elapsed_s = anchor.at.elapsed().as_secs() as i64;
        let utc = Timestamp::from_second(anchor.unix_s + elapsed_s).ok()?;
        Some(local_time(utc, self.offset_s))
    }
}
