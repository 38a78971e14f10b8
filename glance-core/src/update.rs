//! Firmware update session
//!
//! An upload drives a short-lived state machine:
//!
//! ```text
//!          Begun            Finalized
//!   Idle ─────────► Writing ─────────► Complete
//!    │                 │
//!    │ FinalizeFailed  │ FinalizeFailed / Aborted
//!    └────────────────►└──────────────► Failed
//! ```
//!
//! A failed begin leaves the session `Idle`, so every later write comes up
//! short. Errors are recorded and logged but never stop the upload; the
//! response text only reports whether any error happened.

use glance_hal::{FirmwareError, FirmwareWriter};

/// Erase block size of program flash
pub const BLOCK_SIZE: u32 = 0x1000;

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateState {
    /// No image open
    Idle,
    /// Image open, accepting chunks
    Writing,
    /// Image finalized
    Complete,
    /// Image discarded or rejected
    Failed,
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateEvent {
    /// Writer accepted `begin`
    Begun,
    /// Writer refused `begin`
    BeginFailed,
    /// A chunk was offered (whatever the writer made of it)
    Chunk,
    /// Writer finalized the image
    Finalized,
    /// Finalization failed or was refused
    FinalizeFailed,
    /// Upload stopped before its end
    Aborted,
}

impl UpdateState {
    /// Process an event and return the next state
    pub fn transition(self, event: UpdateEvent) -> Self {
        use UpdateEvent::*;
        use UpdateState::*;

        match (self, event) {
            (Idle, Begun) => Writing,
            (Idle, BeginFailed) => Idle,
            (Idle, Chunk) => Idle,
            (Idle, FinalizeFailed | Aborted) => Failed,

            (Writing, Chunk) => Writing,
            (Writing, Finalized) => Complete,
            (Writing, FinalizeFailed | Aborted) => Failed,

            // Terminal states absorb everything
            (state, _) => state,
        }
    }
}

/// Recorded update failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateError {
    /// The writer refused to open an image
    BeginFailure(FirmwareError),
    /// A chunk was only partly written
    StorageWriteShortfall { expected: usize, written: usize },
    /// The image could not be finalized
    FinalizeFailure(FirmwareError),
    /// The upload ended before the file did
    Aborted,
}

/// Capacity to request for a new image given the writer's free space.
///
/// One block is held back and the rest rounded down to whole blocks.
pub fn update_capacity(free_space: u32) -> u32 {
    free_space.saturating_sub(BLOCK_SIZE) & !(BLOCK_SIZE - 1)
}

/// One firmware upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSession {
    state: UpdateState,
    error: Option<UpdateError>,
    written: u32,
}

impl Default for UpdateSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateSession {
    pub fn new() -> Self {
        Self {
            state: UpdateState::Idle,
            error: None,
            written: 0,
        }
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// First error recorded, if any
    pub fn error(&self) -> Option<UpdateError> {
        self.error
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Bytes the writer accepted so far
    pub fn bytes_written(&self) -> u32 {
        self.written
    }

    /// Plain-text body of the upload response
    pub fn response_text(&self) -> &'static str {
        if self.has_error() {
            "Update Failed"
        } else {
            "Update Success! Rebooting..."
        }
    }

    fn apply(&mut self, event: UpdateEvent) {
        let next = self.state.transition(event);
        if next != self.state {
            debug!("update: {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    fn record(&mut self, error: UpdateError) {
        error!("update error: {:?}", error);
        self.error.get_or_insert(error);
    }

    /// Open an image sized to the writer's free space
    pub async fn start<W: FirmwareWriter>(&mut self, writer: &mut W) {
        let capacity = update_capacity(writer.free_space());
        info!("update: begin, capacity {} bytes", capacity);

        match writer.begin(capacity).await {
            Ok(()) => self.apply(UpdateEvent::Begun),
            Err(e) => {
                self.record(UpdateError::BeginFailure(e));
                self.apply(UpdateEvent::BeginFailed);
            }
        }
    }

    /// Append one chunk of the uploaded file
    pub async fn write<W: FirmwareWriter>(&mut self, writer: &mut W, chunk: &[u8]) {
        let written = if self.state == UpdateState::Writing {
            match writer.write(chunk).await {
                Ok(written) => written,
                Err(e) => {
                    warn!("update: write failed: {:?}", e);
                    0
                }
            }
        } else {
            0
        };

        self.written = self.written.saturating_add(written as u32);
        if written != chunk.len() {
            self.record(UpdateError::StorageWriteShortfall {
                expected: chunk.len(),
                written,
            });
        }
        self.apply(UpdateEvent::Chunk);
    }

    /// Finalize the image. Always leaves the session terminal.
    pub async fn end<W: FirmwareWriter>(&mut self, writer: &mut W) {
        if self.state != UpdateState::Writing {
            self.record(UpdateError::FinalizeFailure(FirmwareError::NotStarted));
            self.apply(UpdateEvent::FinalizeFailed);
            return;
        }

        if self.has_error() {
            // An image with a hole in it must never be activated.
            warn!("update: discarding image after earlier error");
            writer.abort();
            self.apply(UpdateEvent::FinalizeFailed);
            return;
        }

        match writer.finish().await {
            Ok(len) => {
                info!("Update Success: {}", len);
                self.apply(UpdateEvent::Finalized);
            }
            Err(e) => {
                self.record(UpdateError::FinalizeFailure(e));
                self.apply(UpdateEvent::FinalizeFailed);
            }
        }
    }

    /// The upload stopped before the file ended
    pub fn abort<W: FirmwareWriter>(&mut self, writer: &mut W) {
        if self.state == UpdateState::Writing {
            writer.abort();
        }
        self.record(UpdateError::Aborted);
        self.apply(UpdateEvent::Aborted);
    }
}
