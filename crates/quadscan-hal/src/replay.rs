//! Capture replay: feeds a recorded byte stream through the pipeline as if it
//! were arriving on a live port.
//!
//! Reads are capped at `chunk` bytes per call, which paces the replay roughly
//! like a serial FIFO and keeps the round-robin scheduler interleaving the
//! devices.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use quadscan_types::ScanError;
use tracing::info;

use crate::channel::{SerialChannel, fault};

/// Default per-read cap: about 2 ms of traffic at 230 400 baud.
pub const DEFAULT_REPLAY_CHUNK: usize = 64;

/// A [`SerialChannel`] over any byte reader, usually a capture file.
pub struct ReplayChannel {
    id: String,
    reader: Box<dyn Read + Send>,
    chunk: usize,
    exhausted: bool,
}

impl ReplayChannel {
    /// Replay from an arbitrary reader.
    pub fn new(id: impl Into<String>, reader: Box<dyn Read + Send>, chunk: usize) -> Self {
        Self {
            id: id.into(),
            reader,
            chunk: chunk.max(1),
            exhausted: false,
        }
    }

    /// Replay the capture file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::ChannelFault`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, chunk: usize) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let id = path.display().to_string();
        let file = File::open(path).map_err(|e| fault(&id, e))?;
        info!(capture = %id, "replaying capture");
        Ok(Self::new(id, Box::new(BufReader::new(file)), chunk))
    }
}

impl SerialChannel for ReplayChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn available(&mut self) -> Result<usize, ScanError> {
        Ok(if self.exhausted { 0 } else { self.chunk })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ScanError> {
        if self.exhausted {
            return Ok(0);
        }
        let n = buf.len().min(self.chunk);
        if n == 0 {
            return Ok(0);
        }
        match self.reader.read(&mut buf[..n]) {
            Ok(0) => {
                self.exhausted = true;
                Ok(0)
            }
            Ok(read) => Ok(read),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(fault(&self.id, e)),
        }
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
