//! Frame Decoder.
//!
//! Turns the unstructured byte stream of one LiDAR channel into validated
//! [`RawPacket`]s.  Each channel owns its own [`FrameDecoder`]; the decoder
//! keeps its partial packet between calls so that "not enough bytes yet" is
//! simply deferred to the next control cycle instead of blocking.
//!
//! # State machine
//!
//! ```text
//!            marker byte              47th byte, CRC ok
//! Searching ────────────▶ Accumulating ─────────────────▶ Ready
//!     ▲                        │  CRC mismatch / stall        │
//!     └────────────────────────┘◀─────────── take_packet ─────┘
//! ```
//!
//! Marker bytes inside a payload are not escaped, so a misframed candidate is
//! possible after a desynchronisation.  The checksum is the only authority:
//! a candidate that fails it is discarded and the scan resumes with the next
//! byte.
//!
//! # Example
//!
//! ```rust
//! use quadscan_perception::frame::{encode, FrameDecoder};
//! use quadscan_types::{RawPacket, RawSample};
//!
//! let mut packet = RawPacket::default();
//! packet.samples[0] = RawSample::new(1000, 200);
//! let wire = encode(&packet);
//!
//! let mut decoder = FrameDecoder::default();
//! // Leading garbage is skipped, the packet arrives in two halves.
//! decoder.push(&[0x00, 0xFF]);
//! decoder.push(&wire[..20]);
//! assert!(decoder.take_packet().is_none());
//! decoder.push(&wire[20..]);
//!
//! let decoded = decoder.take_packet().unwrap();
//! assert_eq!(decoded.samples[0], RawSample::new(1000, 200));
//! ```

use quadscan_types::{PACKET_LEN, RawPacket, START_MARKER, ScanError};
use tracing::debug;

use crate::crc::checksum;

/// Consecutive cycles a partial packet may go without receiving a byte
/// before it is dropped.
pub const DEFAULT_STALL_CYCLES: u32 = 100;

// ────────────────────────────────────────────────────────────────────────────
// Packet-level helpers
// ────────────────────────────────────────────────────────────────────────────

/// Validate a complete candidate and decode it.
///
/// # Errors
///
/// Returns [`ScanError::ChecksumMismatch`] when the trailing byte differs
/// from the CRC of the preceding bytes.
pub fn validate(buf: &[u8; PACKET_LEN]) -> Result<RawPacket, ScanError> {
    let expected = checksum(&buf[..PACKET_LEN - 1]);
    let actual = buf[PACKET_LEN - 1];
    if expected != actual {
        return Err(ScanError::ChecksumMismatch { expected, actual });
    }
    Ok(RawPacket::from_bytes(buf))
}

/// Encode `packet` with a freshly computed checksum.  The `checksum` field of
/// the input is ignored.
pub fn encode(packet: &RawPacket) -> [u8; PACKET_LEN] {
    let mut buf = packet.to_bytes();
    buf[PACKET_LEN - 1] = checksum(&buf[..PACKET_LEN - 1]);
    buf
}

// ────────────────────────────────────────────────────────────────────────────
// FrameDecoder
// ────────────────────────────────────────────────────────────────────────────

/// Where the decoder is in the current packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Discarding bytes until a start marker shows up.
    SearchingMarker,
    /// Marker seen; collecting the rest of the packet.
    Accumulating,
    /// A validated packet is waiting in [`FrameDecoder::take_packet`].
    Ready,
}

/// Running counters for one decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Packets that passed the checksum.
    pub packets: u64,
    /// Candidates discarded because of a checksum mismatch.
    pub checksum_errors: u64,
    /// Partial packets dropped after exceeding the stall budget.
    pub stalls: u64,
    /// Bytes thrown away while searching for a marker.
    pub skipped_bytes: u64,
}

/// Incremental, per-channel packet framer.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: [u8; PACKET_LEN],
    len: usize,
    state: DecoderState,
    ready: Option<RawPacket>,
    stall_cycles: u32,
    cycles_accumulating: u32,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_STALL_CYCLES)
    }
}

impl FrameDecoder {
    /// Create a decoder that drops a partial packet once it has gone more
    /// than `stall_cycles` control cycles without new bytes.
    pub fn new(stall_cycles: u32) -> Self {
        Self {
            buf: [0u8; PACKET_LEN],
            len: 0,
            state: DecoderState::SearchingMarker,
            ready: None,
            stall_cycles,
            cycles_accumulating: 0,
            stats: DecoderStats::default(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Number of bytes of the current candidate held in the accumulator.
    pub fn buffered(&self) -> usize {
        self.len
    }

    /// How many bytes the decoder can take right now without reading past
    /// the current packet: 1 while searching, the remainder of the packet
    /// while accumulating, 0 while a packet is ready.
    pub fn bytes_wanted(&self) -> usize {
        match self.state {
            DecoderState::SearchingMarker => 1,
            DecoderState::Accumulating => PACKET_LEN - self.len,
            DecoderState::Ready => 0,
        }
    }

    /// Feed bytes into the state machine and return how many were consumed.
    ///
    /// Consumption stops as soon as a packet becomes ready; the caller keeps
    /// any unconsumed tail for after [`FrameDecoder::take_packet`].
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let mut consumed = 0;
        while consumed < bytes.len() {
            let rest = &bytes[consumed..];
            match self.state {
                DecoderState::Ready => break,
                DecoderState::SearchingMarker => match rest.iter().position(|&b| b == START_MARKER)
                {
                    Some(at) => {
                        self.stats.skipped_bytes += at as u64;
                        self.buf[0] = START_MARKER;
                        self.len = 1;
                        self.cycles_accumulating = 0;
                        self.state = DecoderState::Accumulating;
                        consumed += at + 1;
                    }
                    None => {
                        self.stats.skipped_bytes += rest.len() as u64;
                        consumed = bytes.len();
                    }
                },
                DecoderState::Accumulating => {
                    let take = (PACKET_LEN - self.len).min(rest.len());
                    self.buf[self.len..self.len + take].copy_from_slice(&rest[..take]);
                    self.len += take;
                    consumed += take;
                    // Progress: only idle cycles count toward the stall budget.
                    self.cycles_accumulating = 0;
                    if self.len == PACKET_LEN {
                        self.complete();
                    }
                }
            }
        }
        consumed
    }

    /// Hand out the ready packet, if any, and resume searching.
    pub fn take_packet(&mut self) -> Option<RawPacket> {
        let packet = self.ready.take();
        if packet.is_some() {
            self.state = DecoderState::SearchingMarker;
        }
        packet
    }

    /// Mark the end of a control cycle.
    ///
    /// A partial packet that has received no bytes for more than
    /// `stall_cycles` consecutive cycles is dropped; any byte pushed in the
    /// meantime restarts the count.  Returns `true` when a packet was dropped.
    pub fn end_cycle(&mut self) -> bool {
        if self.state != DecoderState::Accumulating {
            return false;
        }
        self.cycles_accumulating += 1;
        if self.cycles_accumulating <= self.stall_cycles {
            return false;
        }
        debug!(
            buffered = self.len,
            cycles = self.cycles_accumulating,
            "dropping stalled partial packet"
        );
        self.stats.stalls += 1;
        self.reset();
        true
    }

    /// Forget any partial or ready packet.  Statistics are kept.
    pub fn reset(&mut self) {
        self.len = 0;
        self.ready = None;
        self.cycles_accumulating = 0;
        self.state = DecoderState::SearchingMarker;
    }

    fn complete(&mut self) {
        self.len = 0;
        match validate(&self.buf) {
            Ok(packet) => {
                self.stats.packets += 1;
                self.ready = Some(packet);
                self.state = DecoderState::Ready;
            }
            Err(err) => {
                self.stats.checksum_errors += 1;
                debug!(error = %err, "discarding packet");
                self.state = DecoderState::SearchingMarker;
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
