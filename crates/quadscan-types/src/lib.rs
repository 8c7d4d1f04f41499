//! `quadscan-types` – shared data model for the QuadScan pipeline.
//!
//! Everything that crosses a crate boundary lives here: the wire constants
//! of the LiDAR packet format, the decoded [`RawPacket`], the per-device
//! [`DeviceCalibration`], the transformed [`CartesianPoint`], and the
//! workspace-wide [`ScanError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Wire constants
// ────────────────────────────────────────────────────────────────────────────

/// Sentinel byte that opens every packet.
pub const START_MARKER: u8 = 0x54;

/// Number of range samples carried by one packet.
pub const SAMPLES_PER_PACKET: usize = 12;

/// Bytes used by a single sample on the wire (u16 distance + u8 intensity).
pub const SAMPLE_LEN: usize = 3;

/// Total packet length in bytes, checksum included.
pub const PACKET_LEN: usize = 6 + SAMPLES_PER_PACKET * SAMPLE_LEN + 5;

const SAMPLES_OFFSET: usize = 6;
const END_ANGLE_OFFSET: usize = SAMPLES_OFFSET + SAMPLES_PER_PACKET * SAMPLE_LEN;
const TIMESTAMP_OFFSET: usize = END_ANGLE_OFFSET + 2;
const CHECKSUM_OFFSET: usize = PACKET_LEN - 1;

// ────────────────────────────────────────────────────────────────────────────
// Raw packet
// ────────────────────────────────────────────────────────────────────────────

/// One laser shot: distance in millimetres (0 means no return) and the
/// return intensity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    pub distance_mm: u16,
    pub intensity: u8,
}

impl RawSample {
    pub fn new(distance_mm: u16, intensity: u8) -> Self {
        Self {
            distance_mm,
            intensity,
        }
    }
}

/// A single fixed-size transmission from a LiDAR unit.
///
/// The struct mirrors the wire layout field for field (the start marker is
/// implied).  [`RawPacket::from_bytes`] and [`RawPacket::to_bytes`] only move
/// bytes around; checksum validation belongs to the frame decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPacket {
    /// Version/length byte.  Carried through, never validated.
    pub ver_len: u8,
    /// Rotational speed of the sensor head in degrees per second.
    pub speed: u16,
    /// Angle of the first sample, centidegrees.
    pub start_angle_cdeg: u16,
    pub samples: [RawSample; SAMPLES_PER_PACKET],
    /// Angle of the last sample, centidegrees.
    pub end_angle_cdeg: u16,
    /// Sensor timestamp in milliseconds, wrapping.
    pub timestamp: u16,
    /// Trailing checksum byte as received (or as stamped by an encoder).
    pub checksum: u8,
}

impl Default for RawPacket {
    fn default() -> Self {
        Self {
            ver_len: 0x2C,
            speed: 0,
            start_angle_cdeg: 0,
            samples: [RawSample::default(); SAMPLES_PER_PACKET],
            end_angle_cdeg: 0,
            timestamp: 0,
            checksum: 0,
        }
    }
}

impl RawPacket {
    /// Decode the little-endian field layout of a full packet.
    pub fn from_bytes(buf: &[u8; PACKET_LEN]) -> Self {
        let le = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);

        let mut samples = [RawSample::default(); SAMPLES_PER_PACKET];
        for (i, sample) in samples.iter_mut().enumerate() {
            let base = SAMPLES_OFFSET + i * SAMPLE_LEN;
            *sample = RawSample::new(le(base), buf[base + 2]);
        }

        Self {
            ver_len: buf[1],
            speed: le(2),
            start_angle_cdeg: le(4),
            samples,
            end_angle_cdeg: le(END_ANGLE_OFFSET),
            timestamp: le(TIMESTAMP_OFFSET),
            checksum: buf[CHECKSUM_OFFSET],
        }
    }

    /// Encode the packet into its wire layout, writing `self.checksum` as-is.
    pub fn to_bytes(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[0] = START_MARKER;
        buf[1] = self.ver_len;
        buf[2..4].copy_from_slice(&self.speed.to_le_bytes());
        buf[4..6].copy_from_slice(&self.start_angle_cdeg.to_le_bytes());
        for (i, sample) in self.samples.iter().enumerate() {
            let base = SAMPLES_OFFSET + i * SAMPLE_LEN;
            buf[base..base + 2].copy_from_slice(&sample.distance_mm.to_le_bytes());
            buf[base + 2] = sample.intensity;
        }
        buf[END_ANGLE_OFFSET..END_ANGLE_OFFSET + 2]
            .copy_from_slice(&self.end_angle_cdeg.to_le_bytes());
        buf[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 2].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[CHECKSUM_OFFSET] = self.checksum;
        buf
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Calibration and output points
// ────────────────────────────────────────────────────────────────────────────

/// Static mounting description of one LiDAR unit relative to the shared
/// reference point.  Created once at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCalibration {
    /// Identifier stamped on every point this device produces.
    pub id: u8,
    /// Mounting position, millimetres from the reference point.
    pub x_offset_mm: f32,
    pub y_offset_mm: f32,
    /// Mounting rotation in degrees, added to every sample angle.
    pub angle_offset_deg: f32,
    /// Serial device path (or capture file when replaying).
    pub channel: String,
}

impl DeviceCalibration {
    pub fn new(
        id: u8,
        x_offset_mm: f32,
        y_offset_mm: f32,
        angle_offset_deg: f32,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            id,
            x_offset_mm,
            y_offset_mm,
            angle_offset_deg,
            channel: channel.into(),
        }
    }
}

/// A sample expressed in the shared Cartesian frame.  Transient: produced and
/// consumed within a single control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianPoint {
    pub device_id: u8,
    /// Interpolated sensor-local angle in degrees, normalised to `[0, 360)`.
    pub angle_deg: f32,
    pub distance_mm: u16,
    pub x_mm: f32,
    pub y_mm: f32,
    pub intensity: u8,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type.
///
/// Framing and checksum variants are handled inside the decoder and never
/// reach the scheduler as failures; they exist so that lower-level helpers
/// can report *why* a candidate packet was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanError {
    #[error("Incomplete packet: {available} of {required} bytes available")]
    Incomplete { available: usize, required: usize },

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Channel Fault on {channel}: {details}")]
    ChannelFault { channel: String, details: String },

    #[error("Output Sink Error: {0}")]
    SinkFault(String),

    #[error("Invalid Configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> RawPacket {
        let mut samples = [RawSample::default(); SAMPLES_PER_PACKET];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = RawSample::new(1000 + i as u16 * 7, 100 + i as u8);
        }
        RawPacket {
            ver_len: 0x2C,
            speed: 3600,
            start_angle_cdeg: 35950,
            samples,
            end_angle_cdeg: 60,
            timestamp: 0xBEEF,
            checksum: 0x5A,
        }
    }

    #[test]
    fn packet_len_is_47() {
        assert_eq!(PACKET_LEN, 47);
    }

    #[test]
    fn to_bytes_places_fields_little_endian() {
        let bytes = sample_packet().to_bytes();
        assert_eq!(bytes[0], START_MARKER);
        assert_eq!(bytes[1], 0x2C);
        assert_eq!(&bytes[2..4], &3600u16.to_le_bytes());
        assert_eq!(&bytes[4..6], &35950u16.to_le_bytes());
        // First sample: distance 1000 = 0x03E8, intensity 100.
        assert_eq!(&bytes[6..9], &[0xE8, 0x03, 100]);
        assert_eq!(&bytes[42..44], &60u16.to_le_bytes());
        assert_eq!(&bytes[44..46], &[0xEF, 0xBE]);
        assert_eq!(bytes[46], 0x5A);
    }

    #[test]
    fn from_bytes_reads_back_every_field() {
        let packet = sample_packet();
        let back = RawPacket::from_bytes(&packet.to_bytes());
        assert_eq!(back, packet);
        assert_eq!(back.samples[11], RawSample::new(1077, 111));
    }

    #[test]
    fn calibration_serialization_roundtrip() {
        let cal = DeviceCalibration::new(2, 0.0, -81.0, 180.0, "/dev/ttyUSB2");
        let json = serde_json::to_string(&cal).unwrap();
        let back: DeviceCalibration = serde_json::from_str(&json).unwrap();
        assert_eq!(cal, back);
    }

    #[test]
    fn scan_error_display() {
        let err = ScanError::ChecksumMismatch {
            expected: 0x12,
            actual: 0x34,
        };
        assert!(err.to_string().contains("0x12"));

        let err2 = ScanError::ChannelFault {
            channel: "/dev/ttyUSB1".to_string(),
            details: "device unplugged".to_string(),
        };
        assert!(err2.to_string().contains("/dev/ttyUSB1"));
    }
}
