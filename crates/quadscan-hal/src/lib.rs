//! `quadscan-hal` – byte sources and point sinks.
//!
//! The pipeline never touches a device directly.  LiDAR units are reached
//! through the [`SerialChannel`][channel::SerialChannel] trait and accepted
//! points leave through the [`PointSink`][sink::PointSink] trait, so real
//! hardware, capture replays and simulators are interchangeable.
//!
//! # Modules
//!
//! - [`channel`] – the non-blocking [`SerialChannel`][channel::SerialChannel]
//!   trait.
//! - [`serial`] – [`SerialPortChannel`][serial::SerialPortChannel]: a LiDAR
//!   on a local serial port (8N1), plus [`open_port`][serial::open_port] for
//!   the host output link.
//! - [`replay`] – [`ReplayChannel`][replay::ReplayChannel]: feeds a recorded
//!   capture file through the pipeline.
//! - [`sim`] – [`SimChannel`][sim::SimChannel] and
//!   [`SimLidar`][sim::SimLidar] for headless runs and tests.
//! - [`sink`] – [`LineSink`][sink::LineSink]: CSV or JSON lines, one per
//!   accepted point.

pub mod channel;
pub mod replay;
pub mod serial;
pub mod sim;
pub mod sink;

pub use channel::SerialChannel;
pub use sink::{LineSink, OutputFormat, PointSink};
