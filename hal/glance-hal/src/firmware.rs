//! Firmware image writer
//!
//! An upload streams the new program image in arbitrary-sized chunks. The
//! writer owns the staging area (a spare flash partition on the RP2040)
//! and decides what "finished" means for its platform.

/// Errors from firmware image writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirmwareError {
    /// Requested capacity is zero or larger than the staging area
    NoSpace,
    /// `write`/`finish` called without a successful `begin`
    NotStarted,
    /// `finish` called before any byte was written
    Empty,
    /// Erase or program of the staging area failed
    Flash,
    /// The bootloader could not be told to swap in the new image
    Activate,
}

/// Streaming firmware image sink
pub trait FirmwareWriter {
    /// Bytes the staging area can hold.
    fn free_space(&self) -> u32;

    /// Start a new image of at most `capacity` bytes, discarding any
    /// partially written one.
    fn begin(&mut self, capacity: u32) -> impl core::future::Future<Output = Result<(), FirmwareError>>;

    /// Append `chunk`, returning how many bytes were accepted.
    ///
    /// A return value smaller than `chunk.len()` means the image hit its
    /// capacity; the rest of the chunk was dropped.
    fn write(&mut self, chunk: &[u8]) -> impl core::future::Future<Output = Result<usize, FirmwareError>>;

    /// Flush, validate and mark the image ready. Returns the image length.
    fn finish(&mut self) -> impl core::future::Future<Output = Result<u32, FirmwareError>>;

    /// Drop the image in progress.
    fn abort(&mut self);
}

/// Gathers a byte stream into whole erase sectors.
///
/// Flash can only be programmed after erasing, and only a full sector at a
/// time, so chunks are staged here until a sector is complete. Unwritten
/// bytes keep the erased value `0xFF`.
pub struct SectorBuffer<const N: usize> {
    sector: [u8; N],
    filled: usize,
    offset: usize,
}

impl<const N: usize> SectorBuffer<N> {
    pub const fn new() -> Self {
        Self {
            sector: [0xFF; N],
            filled: 0,
            offset: 0,
        }
    }

    /// Forget everything and start again at offset 0
    pub fn reset(&mut self) {
        self.sector.fill(0xFF);
        self.filled = 0;
        self.offset = 0;
    }

    /// Copy as much of `data` as fits in the current sector, returning how
    /// many bytes were taken.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let take = data.len().min(N - self.filled);
        self.sector[self.filled..self.filled + take].copy_from_slice(&data[..take]);
        self.filled += take;
        take
    }

    pub fn is_full(&self) -> bool {
        self.filled == N
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// The current sector and its offset in the image
    pub fn sector(&self) -> (usize, &[u8; N]) {
        (self.offset, &self.sector)
    }

    /// Move on to the next sector once the current one is on flash.
    pub fn advance(&mut self) {
        self.offset += N;
        self.sector.fill(0xFF);
        self.filled = 0;
    }

    /// Bytes of the image already handed out through [`Self::sector`]
    pub fn flushed(&self) -> usize {
        self.offset
    }
}

impl<const N: usize> Default for SectorBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
