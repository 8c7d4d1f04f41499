//! [`SensorScheduler`] – the round-robin control cycle.
//!
//! One call to [`SensorScheduler::run_cycle`] visits every configured sensor
//! once, in registration order.  For each sensor it decodes at most
//! `max_packets_per_cycle` packets, runs them through the geometry transform
//! and the quality filter, and forwards accepted points to the sink.
//!
//! Nothing here blocks.  A sensor whose packet is only partially available
//! keeps its bytes in its own decoder and is revisited next cycle, so a slow
//! or stalled unit never starves the others.  A channel that fails to read is
//! logged and skipped for the cycle; only a failing sink aborts the cycle.
//!
//! # Example
//!
//! ```rust
//! use quadscan_hal::sim::{SimChannel, SimLidar};
//! use quadscan_hal::sink::MemorySink;
//! use quadscan_kernel::scheduler::{SchedulerSettings, SensorScheduler};
//! use quadscan_types::DeviceCalibration;
//!
//! let channel = SimChannel::new("sim0");
//! let mut lidar = SimLidar::new(1200, 220);
//! channel.inject(&lidar.next_frame());
//!
//! let mut scheduler = SensorScheduler::new(SchedulerSettings::default());
//! scheduler.add_sensor(
//!     DeviceCalibration::new(0, 0.0, 81.0, 0.0, "sim0"),
//!     Box::new(channel.clone()),
//! )
//! .unwrap();
//!
//! let mut sink = MemorySink::default();
//! let report = scheduler.run_cycle(&mut sink).unwrap();
//! assert_eq!(report.packets, 1);
//! assert_eq!(sink.points.len(), 12);
//! ```

use quadscan_hal::channel::SerialChannel;
use quadscan_hal::sink::PointSink;
use quadscan_perception::QualityFilter;
use quadscan_perception::frame::{DEFAULT_STALL_CYCLES, DecoderStats, FrameDecoder};
use quadscan_perception::transform::{TransformOptions, transform};
use quadscan_types::{DeviceCalibration, PACKET_LEN, RawPacket, ScanError};
use tracing::{debug, info, warn};

use crate::watchdog::{ChannelHealth, Watchdog};

/// Default cap on packets decoded from one sensor per cycle.
pub const DEFAULT_MAX_PACKETS_PER_CYCLE: usize = 4;

/// Default number of cycles without a valid packet before a sensor is
/// reported silent.
pub const DEFAULT_SILENT_AFTER_CYCLES: u32 = 2000;

/// Bytes a single decode attempt may read before yielding, which bounds the
/// time spent scanning through garbage.
const READ_BUDGET: usize = 2 * PACKET_LEN;

// ────────────────────────────────────────────────────────────────────────────
// Settings and reports
// ────────────────────────────────────────────────────────────────────────────

/// Process-wide scheduler configuration, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    pub max_packets_per_cycle: usize,
    /// Consecutive cycles without new bytes a partial packet may wait
    /// before it is dropped.
    pub stall_cycles: u32,
    pub silent_after_cycles: u32,
    pub filter: QualityFilter,
    pub transform: TransformOptions,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_packets_per_cycle: DEFAULT_MAX_PACKETS_PER_CYCLE,
            stall_cycles: DEFAULT_STALL_CYCLES,
            silent_after_cycles: DEFAULT_SILENT_AFTER_CYCLES,
            filter: QualityFilter::default(),
            transform: TransformOptions::default(),
        }
    }
}

/// What one control cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub packets: usize,
    pub points_emitted: usize,
    pub points_rejected: usize,
    /// Partial packets dropped for exceeding the stall budget.
    pub stalls: usize,
    /// Sensors skipped because their channel failed to read.
    pub faults: usize,
}

/// Cumulative counters for one sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorStats {
    pub packets: u64,
    pub points_emitted: u64,
    pub points_rejected: u64,
    pub read_faults: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// SensorChannel
// ────────────────────────────────────────────────────────────────────────────

/// One LiDAR unit: its calibration, its byte source and its own decoder.
pub struct SensorChannel {
    calibration: DeviceCalibration,
    channel: Box<dyn SerialChannel>,
    decoder: FrameDecoder,
    stats: SensorStats,
    faulted: bool,
    silent: bool,
}

impl SensorChannel {
    pub fn new(
        calibration: DeviceCalibration,
        channel: Box<dyn SerialChannel>,
        stall_cycles: u32,
    ) -> Self {
        Self {
            calibration,
            channel,
            decoder: FrameDecoder::new(stall_cycles),
            stats: SensorStats::default(),
            faulted: false,
            silent: false,
        }
    }

    pub fn calibration(&self) -> &DeviceCalibration {
        &self.calibration
    }

    pub fn stats(&self) -> SensorStats {
        self.stats
    }

    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Pull bytes from the channel until a validated packet is ready or
    /// nothing more is buffered.
    ///
    /// Never reads past the end of the packet being assembled and never
    /// waits: `Ok(None)` means "not yet", and whatever was read stays in the
    /// decoder for the next attempt.
    ///
    /// # Errors
    ///
    /// Propagates [`ScanError::ChannelFault`] from the channel.
    pub fn try_decode_next(&mut self) -> Result<Option<RawPacket>, ScanError> {
        let mut scratch = [0u8; PACKET_LEN];
        let mut budget = READ_BUDGET;

        loop {
            if let Some(packet) = self.decoder.take_packet() {
                return Ok(Some(packet));
            }
            if budget == 0 {
                return Ok(None);
            }
            let available = self.channel.available()?;
            let want = self.decoder.bytes_wanted().min(available).min(budget);
            if want == 0 {
                return Ok(None);
            }
            let read = self.channel.read(&mut scratch[..want])?;
            if read == 0 {
                return Ok(None);
            }
            budget -= read;
            self.decoder.push(&scratch[..read]);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SensorScheduler
// ────────────────────────────────────────────────────────────────────────────

/// Owns every sensor and drives them in strict round-robin order.
pub struct SensorScheduler {
    sensors: Vec<SensorChannel>,
    settings: SchedulerSettings,
    watchdog: Watchdog,
    cycles: u64,
}

impl SensorScheduler {
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            sensors: Vec::new(),
            settings,
            watchdog: Watchdog::new(),
            cycles: 0,
        }
    }

    /// Append a sensor to the rotation.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfig`] if a sensor with the same device
    /// id is already registered.
    pub fn add_sensor(
        &mut self,
        calibration: DeviceCalibration,
        channel: Box<dyn SerialChannel>,
    ) -> Result<(), ScanError> {
        if self.sensors.iter().any(|s| s.calibration.id == calibration.id) {
            return Err(ScanError::InvalidConfig(format!(
                "duplicate device id {}",
                calibration.id
            )));
        }
        self.watchdog
            .register(calibration.id, self.settings.silent_after_cycles);
        info!(
            device = calibration.id,
            channel = channel.id(),
            angle_offset_deg = calibration.angle_offset_deg,
            "sensor registered"
        );
        self.sensors.push(SensorChannel::new(
            calibration,
            channel,
            self.settings.stall_cycles,
        ));
        Ok(())
    }

    pub fn sensors(&self) -> &[SensorChannel] {
        &self.sensors
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Completed control cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn health(&self, device_id: u8) -> ChannelHealth {
        self.watchdog.health(device_id)
    }

    /// `true` when every channel has permanently run dry (all replays
    /// finished).  Always `false` while any live port is configured.
    pub fn all_exhausted(&self) -> bool {
        !self.sensors.is_empty() && self.sensors.iter().all(|s| s.channel.is_exhausted())
    }

    /// Run one control cycle over every sensor.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::SinkFault`] if the sink rejects a point.  Channel
    /// failures are logged and counted in the report instead.
    pub fn run_cycle(&mut self, sink: &mut dyn PointSink) -> Result<CycleReport, ScanError> {
        let mut report = CycleReport::default();

        for sensor in &mut self.sensors {
            let id = sensor.calibration.id;
            for _ in 0..self.settings.max_packets_per_cycle {
                match sensor.try_decode_next() {
                    Ok(Some(packet)) => {
                        sensor.faulted = false;
                        self.watchdog.heartbeat(id);
                        process_packet(sensor, &packet, &self.settings, sink, &mut report)?;
                    }
                    Ok(None) => break,
                    Err(err) => {
                        report.faults += 1;
                        sensor.stats.read_faults += 1;
                        if !sensor.faulted {
                            warn!(
                                device = id,
                                error = %err,
                                "channel read failed; skipping sensor this cycle"
                            );
                        } else {
                            debug!(device = id, error = %err, "channel still failing");
                        }
                        sensor.faulted = true;
                        break;
                    }
                }
            }
            let buffered = sensor.decoder.buffered();
            if sensor.decoder.end_cycle() {
                report.stalls += 1;
                debug!(device = id, buffered, "stalled partial packet dropped");
            }
        }

        self.watchdog.tick();
        self.cycles += 1;
        self.log_health_changes();
        Ok(report)
    }

    fn log_health_changes(&mut self) {
        let silent_ids = self.watchdog.check_all();
        for sensor in &mut self.sensors {
            let id = sensor.calibration.id;
            let silent = silent_ids.contains(&id);
            if silent && !sensor.silent {
                warn!(
                    device = id,
                    channel = sensor.channel.id(),
                    cycles = self.settings.silent_after_cycles,
                    "sensor silent: no valid packet within budget"
                );
            } else if !silent && sensor.silent {
                info!(device = id, "sensor recovered");
            }
            sensor.silent = silent;
        }
    }
}

/// Transform, filter and emit one packet's samples.
fn process_packet(
    sensor: &mut SensorChannel,
    packet: &RawPacket,
    settings: &SchedulerSettings,
    sink: &mut dyn PointSink,
    report: &mut CycleReport,
) -> Result<(), ScanError> {
    report.packets += 1;
    sensor.stats.packets += 1;

    let points = transform(packet, &sensor.calibration, settings.transform);
    for (sample, point) in packet.samples.iter().zip(&points) {
        if settings.filter.accept(sample) {
            sink.emit(point)?;
            report.points_emitted += 1;
            sensor.stats.points_emitted += 1;
        } else {
            report.points_rejected += 1;
            sensor.stats.points_rejected += 1;
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
