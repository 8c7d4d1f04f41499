//! `quadscan-kernel` – Scheduling & Supervision
//!
//! Drives every LiDAR unit through one shared, non-blocking control loop.
//! It owns no hardware itself; channels and sinks come from `quadscan-hal`,
//! decoding and geometry from `quadscan-perception`.
//!
//! # Modules
//!
//! - [`scheduler`] – [`SensorScheduler`][scheduler::SensorScheduler]:
//!   visits each sensor once per cycle in a fixed order, decodes a bounded
//!   number of packets per sensor, and forwards filtered points to a
//!   [`PointSink`][quadscan_hal::PointSink].
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]:
//!   counts cycles since each device last produced a valid packet and flags
//!   the ones that have gone silent.

pub mod scheduler;
pub mod watchdog;

pub use scheduler::{CycleReport, SchedulerSettings, SensorChannel, SensorScheduler, SensorStats};
pub use watchdog::{ChannelHealth, Watchdog};
