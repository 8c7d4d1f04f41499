//! `quadscan-perception` – packet framing and point geometry.
//!
//! Turns raw serial bytes from a LiDAR unit into filtered points in the
//! shared reference frame.
//!
//! # Modules
//!
//! - [`crc`] – [`checksum`][crc::checksum]: table-driven CRC-8 over a byte
//!   range.
//! - [`frame`] – [`FrameDecoder`][frame::FrameDecoder]: per-channel state
//!   machine that locates packet boundaries in the byte stream and validates
//!   each candidate against its checksum.
//! - [`transform`] – [`transform`][transform::transform]: interpolates
//!   per-sample angles and projects the polar samples into Cartesian
//!   coordinates using the device calibration.
//! - [`filter`] – [`QualityFilter`][filter::QualityFilter]: drops samples
//!   outside the configured distance and intensity bounds.

pub mod crc;
pub mod filter;
pub mod frame;
pub mod transform;

pub use filter::QualityFilter;
pub use frame::{DecoderState, DecoderStats, FrameDecoder};
pub use transform::TransformOptions;
