//! [`Watchdog`] – per-sensor liveness monitor.
//!
//! Every validated packet counts as a heartbeat for the device that sent it.
//! Time is measured in control cycles rather than wall-clock time, so the
//! verdict depends only on what the scheduler observed.  A device that has
//! gone more than its budget of cycles without a heartbeat is *silent*.
//!
//! Call [`Watchdog::tick`] once at the end of every control cycle and
//! [`Watchdog::check_all`] to obtain the silent device ids.

use std::collections::BTreeMap;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Health state reported for a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelHealth {
    /// A valid packet arrived within the device's budget.
    Healthy,
    /// No valid packet for longer than the budget.
    Silent,
}

// ────────────────────────────────────────────────────────────────────────────
// Internal entry
// ────────────────────────────────────────────────────────────────────────────

struct ChannelEntry {
    cycles_since_packet: u32,
    silent_after: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Watchdog
// ────────────────────────────────────────────────────────────────────────────

/// Tracks heartbeats from registered devices and detects silent ones.
///
/// # Example
///
/// ```
/// use quadscan_kernel::watchdog::{ChannelHealth, Watchdog};
///
/// let mut wd = Watchdog::new();
/// wd.register(0, 2);
/// wd.tick();
/// wd.tick();
/// assert_eq!(wd.health(0), ChannelHealth::Healthy);
/// wd.tick();
/// assert_eq!(wd.health(0), ChannelHealth::Silent);
///
/// wd.heartbeat(0);
/// assert_eq!(wd.health(0), ChannelHealth::Healthy);
/// ```
#[derive(Default)]
pub struct Watchdog {
    channels: BTreeMap<u8, ChannelEntry>,
}

impl Watchdog {
    /// Create an empty watchdog with no registered devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `device_id`, declaring it silent after `silent_after_cycles`
    /// cycles without a heartbeat.
    ///
    /// Re-registering an existing device resets its counter.
    pub fn register(&mut self, device_id: u8, silent_after_cycles: u32) {
        self.channels.insert(
            device_id,
            ChannelEntry {
                cycles_since_packet: 0,
                silent_after: silent_after_cycles,
            },
        );
    }

    /// Record a heartbeat for `device_id`.
    ///
    /// No-ops for devices that have not been registered.
    pub fn heartbeat(&mut self, device_id: u8) {
        if let Some(entry) = self.channels.get_mut(&device_id) {
            entry.cycles_since_packet = 0;
        }
    }

    /// Advance every device by one control cycle.
    pub fn tick(&mut self) {
        for entry in self.channels.values_mut() {
            entry.cycles_since_packet = entry.cycles_since_packet.saturating_add(1);
        }
    }

    /// Return the [`ChannelHealth`] of `device_id`.
    ///
    /// Returns [`ChannelHealth::Silent`] for unknown devices.
    pub fn health(&self, device_id: u8) -> ChannelHealth {
        match self.channels.get(&device_id) {
            Some(entry) if entry.cycles_since_packet <= entry.silent_after => {
                ChannelHealth::Healthy
            }
            _ => ChannelHealth::Silent,
        }
    }

    /// Ids of all silent devices, in ascending order.
    pub fn check_all(&self) -> Vec<u8> {
        self.channels
            .iter()
            .filter(|(_, entry)| entry.cycles_since_packet > entry.silent_after)
            .map(|(id, _)| *id)
            .collect()
    }
}
