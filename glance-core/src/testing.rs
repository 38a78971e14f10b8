//! In-memory platform for host tests

use std::collections::{BTreeMap, VecDeque};
use std::string::String;
use std::vec::Vec;

use embedded_io_async::{ErrorType, Read, Write};
use glance_hal::{Backlight, FirmwareError, FirmwareWriter, FlashError, FlashStorage, StorageKey};
use jiff::civil::DateTime;

use crate::clock::TimeSource;
use crate::config::DeviceConfig;
use crate::device::{Device, Parts, Platform};
use crate::render::{Anchor, Canvas, Color, Font, Point, Rect};
use crate::sync::{HttpTransport, Network, Response, TransportError};

/// One recorded canvas call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draw {
    Fill(Rect, Color),
    RoundRect(Rect, u32, Color),
    Text(String, Point, Anchor, Font, Color),
}

impl Draw {
    /// Topmost row the call refers to
    pub fn top(&self) -> i32 {
        match self {
            Draw::Fill(rect, _) | Draw::RoundRect(rect, _, _) => rect.y,
            Draw::Text(_, at, ..) => at.y,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub draws: Vec<Draw>,
}

impl RecordingCanvas {
    pub fn texts(&self) -> Vec<&str> {
        self.draws
            .iter()
            .filter_map(|draw| match draw {
                Draw::Text(text, ..) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for RecordingCanvas {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.draws.push(Draw::Fill(rect, color));
    }

    fn fill_round_rect(&mut self, rect: Rect, radius: u32, color: Color) {
        self.draws.push(Draw::RoundRect(rect, radius, color));
    }

    fn draw_text(&mut self, text: &str, at: Point, anchor: Anchor, font: Font, color: Color) {
        self.draws.push(Draw::Text(text.into(), at, anchor, font, color));
    }
}

#[derive(Debug, Default)]
pub struct RecordingBacklight {
    pub duties: Vec<u8>,
}

impl Backlight for RecordingBacklight {
    fn set_duty(&mut self, duty: u8) {
        self.duties.push(duty);
    }
}

/// Network whose link state is fixed
#[derive(Debug, Clone, Copy)]
pub struct Link(pub bool);

impl Network for Link {
    fn is_connected(&self) -> bool {
        self.0
    }
}

/// Transport replaying canned results; fails to connect once they run out
#[derive(Debug, Default)]
pub struct ScriptedHttp {
    responses: VecDeque<Result<Response, TransportError>>,
    pub requests: Vec<(String, u32)>,
}

impl ScriptedHttp {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<Response, TransportError>>,
    {
        Self {
            responses: responses.into_iter().collect(),
            requests: Vec::new(),
        }
    }
}

impl HttpTransport for ScriptedHttp {
    async fn get(&mut self, url: &str, timeout_ms: u32) -> Result<Response, TransportError> {
        self.requests.push((url.into(), timeout_ms));
        self.responses
            .pop_front()
            .unwrap_or(Err(TransportError::Connect))
    }
}

/// Time source that is either never synced or stuck at one instant
#[derive(Debug, Default)]
pub struct FakeClock {
    pub configured: Vec<i32>,
    pub synced: bool,
}

impl TimeSource for FakeClock {
    async fn configure(&mut self, offset_s: i32) {
        self.configured.push(offset_s);
    }

    fn local_now(&self) -> Option<DateTime> {
        self.synced
            .then(|| jiff::civil::date(2024, 3, 1).at(20, 30, 0, 0))
    }
}

#[derive(Debug, Default)]
pub struct MemoryFlash {
    records: BTreeMap<u8, Vec<u8>>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl MemoryFlash {
    pub fn insert(&mut self, key: StorageKey, data: &[u8]) {
        self.records.insert(key.as_u8(), data.to_vec());
    }

    pub fn record(&self, key: StorageKey) -> Option<&[u8]> {
        self.records.get(&key.as_u8()).map(Vec::as_slice)
    }
}

impl FlashStorage for MemoryFlash {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        if self.fail_reads {
            return Err(FlashError::Flash);
        }
        let record = self.records.get(&key.as_u8()).ok_or(FlashError::NotFound)?;
        let slot = buffer
            .get_mut(..record.len())
            .ok_or(FlashError::BufferTooSmall)?;
        slot.copy_from_slice(record);
        Ok(record.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        if self.fail_writes {
            return Err(FlashError::Flash);
        }
        self.insert(key, data);
        Ok(())
    }

    async fn exists(&mut self, key: StorageKey) -> bool {
        self.records.contains_key(&key.as_u8())
    }

    async fn erase_all(&mut self) -> Result<(), FlashError> {
        self.records.clear();
        Ok(())
    }
}

/// Firmware writer collecting the image in memory
#[derive(Debug)]
pub struct VecWriter {
    pub free: u32,
    /// Capacity of the image in progress, cleared by `finish`/`abort`
    pub capacity: Option<u32>,
    /// Capacity asked for by the last successful `begin`
    pub requested: Option<u32>,
    pub data: Vec<u8>,
    pub finished: Option<Vec<u8>>,
    pub aborted: bool,
    /// Total bytes accepted before writes start coming up short
    pub accept_limit: Option<usize>,
}

impl VecWriter {
    pub fn new(free: u32) -> Self {
        Self {
            free,
            capacity: None,
            requested: None,
            data: Vec::new(),
            finished: None,
            aborted: false,
            accept_limit: None,
        }
    }
}

impl FirmwareWriter for VecWriter {
    fn free_space(&self) -> u32 {
        self.free
    }

    async fn begin(&mut self, capacity: u32) -> Result<(), FirmwareError> {
        if capacity == 0 || capacity > self.free {
            return Err(FirmwareError::NoSpace);
        }
        self.capacity = Some(capacity);
        self.requested = Some(capacity);
        self.data.clear();
        Ok(())
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<usize, FirmwareError> {
        let capacity = self.capacity.ok_or(FirmwareError::NotStarted)? as usize;
        let limit = self.accept_limit.map_or(capacity, |limit| limit.min(capacity));
        let accepted = chunk.len().min(limit.saturating_sub(self.data.len()));
        self.data.extend_from_slice(&chunk[..accepted]);
        Ok(accepted)
    }

    async fn finish(&mut self) -> Result<u32, FirmwareError> {
        if self.capacity.is_none() {
            return Err(FirmwareError::NotStarted);
        }
        if self.data.is_empty() {
            return Err(FirmwareError::Empty);
        }
        let image = core::mem::take(&mut self.data);
        let len = image.len() as u32;
        self.finished = Some(image);
        self.capacity = None;
        Ok(len)
    }

    fn abort(&mut self) {
        self.aborted = true;
        self.capacity = None;
        self.data.clear();
    }
}

/// Client connection replaying a request, `chunk` bytes per read
#[derive(Debug)]
pub struct Connection {
    input: Vec<u8>,
    position: usize,
    chunk: usize,
    pub output: Vec<u8>,
}

impl Connection {
    pub fn new(request: &[u8]) -> Self {
        Self {
            input: request.to_vec(),
            position: 0,
            chunk: usize::MAX,
            output: Vec::new(),
        }
    }

    pub fn chunked(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl ErrorType for Connection {
    type Error = core::convert::Infallible;
}

impl Read for Connection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let rest = &self.input[self.position..];
        let n = rest.len().min(buf.len()).min(self.chunk);
        buf[..n].copy_from_slice(&rest[..n]);
        self.position += n;
        Ok(n)
    }
}

impl Write for Connection {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub struct TestPlatform;

impl Platform for TestPlatform {
    type Canvas = RecordingCanvas;
    type Backlight = RecordingBacklight;
    type Network = Link;
    type Http = ScriptedHttp;
    type Clock = FakeClock;
    type Storage = MemoryFlash;
    type Firmware = VecWriter;
}

pub fn parts(http: ScriptedHttp) -> Parts<TestPlatform> {
    Parts {
        canvas: RecordingCanvas::default(),
        backlight: RecordingBacklight::default(),
        network: Link(true),
        http,
        clock: FakeClock::default(),
        storage: MemoryFlash::default(),
        firmware: VecWriter::new(0x10_0000),
    }
}

/// Device on the in-memory platform with default configuration
pub fn device(http: ScriptedHttp) -> Device<TestPlatform> {
    Device::new(parts(http), &DeviceConfig::default())
}
