//! In-process simulation channels for testing without physical LiDAR units.
//!
//! - [`SimChannel`] is a shared in-memory byte queue.  Clone the handle, hand
//!   one copy to the scheduler and inject bytes through the other.
//! - [`SimLidar`] synthesises a well-formed packet stream for a sensor
//!   standing in the middle of a circular wall, so the whole stack can run
//!   headless.
//!
//! # Example
//!
//! ```rust
//! use quadscan_hal::channel::SerialChannel;
//! use quadscan_hal::sim::{SimChannel, SimLidar};
//!
//! let mut channel = SimChannel::new("sim0");
//! let mut lidar = SimLidar::new(1200, 220);
//! channel.inject(&lidar.next_frame());
//!
//! assert_eq!(channel.available().unwrap(), 47);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use quadscan_perception::frame::encode;
use quadscan_types::{PACKET_LEN, RawPacket, RawSample, SAMPLES_PER_PACKET, ScanError};

use crate::channel::SerialChannel;

// ────────────────────────────────────────────────────────────────────────────
// SimChannel
// ────────────────────────────────────────────────────────────────────────────

/// Shared in-memory byte queue implementing [`SerialChannel`].
#[derive(Clone)]
pub struct SimChannel {
    id: String,
    queue: Arc<Mutex<VecDeque<u8>>>,
}

impl SimChannel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Queue bytes for the reader side.
    pub fn inject(&self, bytes: &[u8]) {
        self.lock().extend(bytes);
    }

    /// Bytes injected but not yet read.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u8>> {
        // The queue holds plain bytes; a poisoned lock leaves them intact.
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SerialChannel for SimChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn available(&mut self) -> Result<usize, ScanError> {
        Ok(self.pending())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ScanError> {
        let mut queue = self.lock();
        let n = buf.len().min(queue.len());
        for (slot, byte) in buf.iter_mut().zip(queue.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimLidar
// ────────────────────────────────────────────────────────────────────────────

/// Angular pitch between consecutive samples, centidegrees.
const SAMPLE_PITCH_CDEG: u16 = 80;

/// Deterministic packet generator: every sample sees the same range.
#[derive(Debug, Clone)]
pub struct SimLidar {
    range_mm: u16,
    intensity: u8,
    next_start_cdeg: u16,
    timestamp: u16,
}

impl SimLidar {
    pub fn new(range_mm: u16, intensity: u8) -> Self {
        Self {
            range_mm,
            intensity,
            next_start_cdeg: 0,
            timestamp: 0,
        }
    }

    /// Next packet of the sweep, as decoded fields.
    pub fn next_packet(&mut self) -> RawPacket {
        let start = self.next_start_cdeg;
        let end = (start + SAMPLE_PITCH_CDEG * (SAMPLES_PER_PACKET as u16 - 1)) % 36000;
        self.next_start_cdeg = (start + SAMPLE_PITCH_CDEG * SAMPLES_PER_PACKET as u16) % 36000;
        self.timestamp = self.timestamp.wrapping_add(2);

        RawPacket {
            speed: 3600,
            start_angle_cdeg: start,
            samples: [RawSample::new(self.range_mm, self.intensity); SAMPLES_PER_PACKET],
            end_angle_cdeg: end,
            timestamp: self.timestamp,
            ..RawPacket::default()
        }
    }

    /// Next packet of the sweep, encoded with a valid checksum.
    pub fn next_frame(&mut self) -> [u8; PACKET_LEN] {
        encode(&self.next_packet())
    }
}
