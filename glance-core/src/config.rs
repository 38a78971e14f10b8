//! Device configuration
//!
//! A minimal parser for the subset of TOML used by `device.toml`. It does
//! NOT support the full TOML spec.
//!
//! Supported features:
//! - `key = value` pairs (string, integer)
//! - Flat arrays of strings: `ntp_servers = ["a", "b"]`
//! - `[section]` headers
//! - Comments (`# ...`)
//!
//! Every key is optional; unknown sections and keys are errors.

use heapless::{String, Vec};

use crate::scheduler::{CLOCK_PERIOD_MS, SYNC_PERIOD_MS};
use crate::settings::Settings;
use crate::sync::{DEFAULT_TIMEOUT_MS, MAX_URL_LEN};

/// Maximum NTP host name length
pub const MAX_HOST_LEN: usize = 64;
/// Maximum number of NTP servers
pub const MAX_NTP_SERVERS: usize = 3;
/// 802.11 SSID limit
pub const MAX_SSID_LEN: usize = 32;
/// WPA2 passphrase limit
pub const MAX_PASSWORD_LEN: usize = 64;
/// Maximum DHCP host name length
pub const MAX_HOSTNAME_LEN: usize = 32;

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Key not valid in its section
    UnknownKey,
    /// Invalid value type
    InvalidValue,
    /// String exceeds its buffer
    TooLong,
    /// Too many items (exceeded heapless capacity)
    TooManyItems,
}

/// `[feed]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub url: String<MAX_URL_LEN>,
    pub timeout_ms: u32,
    pub refresh_ms: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            refresh_ms: SYNC_PERIOD_MS,
        }
    }
}

/// `[clock]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockConfig {
    pub refresh_ms: u32,
    pub ntp_servers: Vec<String<MAX_HOST_LEN>, MAX_NTP_SERVERS>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        let mut ntp_servers = Vec::new();
        for host in ["pool.ntp.org", "time.google.com"] {
            if let Ok(host) = String::try_from(host) {
                let _ = ntp_servers.push(host);
            }
        }
        Self {
            refresh_ms: CLOCK_PERIOD_MS,
            ntp_servers,
        }
    }
}

/// `[wifi]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiConfig {
    pub ssid: String<MAX_SSID_LEN>,
    pub password: String<MAX_PASSWORD_LEN>,
    pub hostname: String<MAX_HOSTNAME_LEN>,
}

impl Default for WifiConfig {
    fn default() -> Self {
        let mut hostname = String::new();
        let _ = hostname.push_str("glance");
        Self {
            ssid: String::new(),
            password: String::new(),
            hostname,
        }
    }
}

/// Complete device configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceConfig {
    pub feed: FeedConfig,
    pub clock: ClockConfig,
    /// Defaults applied when stored settings are missing or invalid
    pub settings: Settings,
    pub wifi: WifiConfig,
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Feed,
    Clock,
    Settings,
    Wifi,
}

/// Parse TOML configuration into a [`DeviceConfig`]
pub fn parse_config(input: &str) -> Result<DeviceConfig, ParseError> {
    let mut config = DeviceConfig::default();
    let mut section = Section::Root;

    for line in input.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = parse_section_header(&line[1..line.len() - 1])?;
            continue;
        }

        if let Some((key, value)) = parse_key_value(line) {
            apply_value(section, key, value, &mut config)?;
        }
    }

    Ok(config)
}

fn parse_section_header(header: &str) -> Result<Section, ParseError> {
    match header.trim() {
        "feed" => Ok(Section::Feed),
        "clock" => Ok(Section::Clock),
        "settings" => Ok(Section::Settings),
        "wifi" => Ok(Section::Wifi),
        _ => Err(ParseError::InvalidSection),
    }
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut DeviceConfig,
) -> Result<(), ParseError> {
    match (section, key) {
        (Section::Feed, "url") => config.feed.url = parse_bounded(value)?,
        (Section::Feed, "timeout_ms") => config.feed.timeout_ms = parse_int(value)?,
        (Section::Feed, "refresh_ms") => config.feed.refresh_ms = parse_int(value)?,

        (Section::Clock, "refresh_ms") => config.clock.refresh_ms = parse_int(value)?,
        (Section::Clock, "ntp_servers") => config.clock.ntp_servers = parse_string_array(value)?,

        (Section::Settings, "timezone_offset_s") => {
            config.settings.timezone_offset_s = parse_int(value)?
        }
        (Section::Settings, "brightness_pct") => config.settings.brightness_pct = parse_int(value)?,

        (Section::Wifi, "ssid") => config.wifi.ssid = parse_bounded(value)?,
        (Section::Wifi, "password") => config.wifi.password = parse_bounded(value)?,
        (Section::Wifi, "hostname") => config.wifi.hostname = parse_bounded(value)?,

        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = strip_comment(line[eq_pos + 1..].trim());

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Remove an inline comment, ignoring `#` inside strings
fn strip_comment(value: &str) -> &str {
    let mut in_string = false;
    for (pos, ch) in value.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return value[..pos].trim(),
            _ => {}
        }
    }
    value
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> &str {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        &value[1..value.len() - 1]
    } else {
        // Allow unquoted strings for simple values
        value
    }
}

fn parse_bounded<const N: usize>(value: &str) -> Result<String<N>, ParseError> {
    String::try_from(parse_string(value)).map_err(|_| ParseError::TooLong)
}

/// Parse an integer value
fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue)
}

/// Parse `["a", "b"]`; a trailing comma is allowed
fn parse_string_array<const LEN: usize, const N: usize>(
    value: &str,
) -> Result<Vec<String<LEN>, N>, ParseError> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or(ParseError::InvalidValue)?;

    let mut items = Vec::new();
    for item in inner.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        items
            .push(parse_bounded(item)?)
            .map_err(|_| ParseError::TooManyItems)?;
    }
    Ok(items)
}
