//! Configuration – reads/writes `~/.quadscan/config.toml`.

use quadscan_hal::OutputFormat;
use quadscan_kernel::scheduler::{
    DEFAULT_MAX_PACKETS_PER_CYCLE, DEFAULT_SILENT_AFTER_CYCLES, SchedulerSettings,
};
use quadscan_perception::QualityFilter;
use quadscan_perception::frame::DEFAULT_STALL_CYCLES;
use quadscan_perception::transform::TransformOptions;
use quadscan_types::{DeviceCalibration, ScanError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One LiDAR unit: where its bytes come from and how it is mounted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: u8,

    /// Serial device path, or a capture file when `replay` is set.
    pub port: String,

    #[serde(default = "default_device_baud")]
    pub baud: u32,

    #[serde(default)]
    pub x_offset_mm: f32,

    #[serde(default)]
    pub y_offset_mm: f32,

    #[serde(default)]
    pub angle_offset_deg: f32,

    /// Read `port` as a recorded byte stream instead of opening a serial port.
    #[serde(default)]
    pub replay: bool,
}

impl DeviceConfig {
    pub fn calibration(&self) -> DeviceCalibration {
        DeviceCalibration::new(
            self.id,
            self.x_offset_mm,
            self.y_offset_mm,
            self.angle_offset_deg,
            self.port.clone(),
        )
    }
}

/// Persisted configuration stored in `~/.quadscan/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Host serial port for the point stream.  Unset means stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_port: Option<String>,

    #[serde(default = "default_output_baud")]
    pub output_baud: u32,

    #[serde(default)]
    pub output_format: OutputFormat,

    /// Ignore `devices[].port` and feed every device from a simulated sweep.
    #[serde(default)]
    pub simulate: bool,

    /// Sleep after a cycle that decoded nothing, in microseconds.
    #[serde(default = "default_idle_sleep_us")]
    pub idle_sleep_us: u64,

    #[serde(default = "default_max_packets_per_cycle")]
    pub max_packets_per_cycle: usize,

    #[serde(default = "default_stall_cycles")]
    pub stall_cycles: u32,

    #[serde(default = "default_silent_after_cycles")]
    pub silent_after_cycles: u32,

    /// Translate points by each device's mounting position.
    #[serde(default)]
    pub apply_position_offset: bool,

    #[serde(default)]
    pub filter: QualityFilter,

    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceConfig>,
}

fn default_device_baud() -> u32 {
    230_400
}
fn default_output_baud() -> u32 {
    5_000_000
}
fn default_idle_sleep_us() -> u64 {
    500
}
fn default_max_packets_per_cycle() -> usize {
    DEFAULT_MAX_PACKETS_PER_CYCLE
}
fn default_stall_cycles() -> u32 {
    DEFAULT_STALL_CYCLES
}
fn default_silent_after_cycles() -> u32 {
    DEFAULT_SILENT_AFTER_CYCLES
}

/// The four-quadrant rig: one unit on each side of the reference point.
fn default_devices() -> Vec<DeviceConfig> {
    [
        (0u8, 0.0f32, 81.0f32, 0.0f32),
        (1, 80.0, 0.0, 90.0),
        (2, 0.0, -81.0, 180.0),
        (3, -80.0, 0.0, 270.0),
    ]
    .into_iter()
    .map(|(id, x, y, angle)| DeviceConfig {
        id,
        port: format!("/dev/ttyUSB{id}"),
        baud: default_device_baud(),
        x_offset_mm: x,
        y_offset_mm: y,
        angle_offset_deg: angle,
        replay: false,
    })
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_port: None,
            output_baud: default_output_baud(),
            output_format: OutputFormat::default(),
            simulate: false,
            idle_sleep_us: default_idle_sleep_us(),
            max_packets_per_cycle: default_max_packets_per_cycle(),
            stall_cycles: default_stall_cycles(),
            silent_after_cycles: default_silent_after_cycles(),
            apply_position_offset: false,
            filter: QualityFilter::default(),
            devices: default_devices(),
        }
    }
}

impl Config {
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            max_packets_per_cycle: self.max_packets_per_cycle,
            stall_cycles: self.stall_cycles,
            silent_after_cycles: self.silent_after_cycles,
            filter: self.filter,
            transform: TransformOptions {
                apply_position_offset: self.apply_position_offset,
            },
        }
    }

    /// Reject configurations the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfig`] naming the first problem found.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.devices.is_empty() {
            return Err(ScanError::InvalidConfig("no devices configured".into()));
        }
        let mut seen = BTreeSet::new();
        for device in &self.devices {
            if !seen.insert(device.id) {
                return Err(ScanError::InvalidConfig(format!(
                    "duplicate device id {}",
                    device.id
                )));
            }
            if device.baud == 0 && !device.replay {
                return Err(ScanError::InvalidConfig(format!(
                    "device {} has a zero baud rate",
                    device.id
                )));
            }
        }
        if self.filter.min_distance_mm >= self.filter.max_distance_mm {
            return Err(ScanError::InvalidConfig(format!(
                "min_distance_mm ({}) must be below max_distance_mm ({})",
                self.filter.min_distance_mm, self.filter.max_distance_mm
            )));
        }
        if self.output_port.is_some() && self.output_baud == 0 {
            return Err(ScanError::InvalidConfig(
                "output_baud must be non-zero".into(),
            ));
        }
        if self.stall_cycles == 0 {
            return Err(ScanError::InvalidConfig(
                "stall_cycles must be at least 1".into(),
            ));
        }
        if self.max_packets_per_cycle == 0 {
            return Err(ScanError::InvalidConfig(
                "max_packets_per_cycle must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Return the path to `~/.quadscan/config.toml`.
pub fn default_config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".quadscan").join("config.toml")
}

/// Pick the config file: the explicit argument, then `$QUADSCAN_CONFIG`,
/// then the default under the home directory.  The flag is `true` only for
/// the default location.
pub fn resolve_path(arg: Option<String>) -> (PathBuf, bool) {
    match arg.or_else(|| std::env::var("QUADSCAN_CONFIG").ok()) {
        Some(p) if !p.trim().is_empty() => (PathBuf::from(p), false),
        _ => (default_config_path(), true),
    }
}

/// Load the config at `path`, apply environment overrides and validate.
pub fn load_or_init(path: &Path, is_default: bool) -> Result<Config, String> {
    let mut cfg = load_or_create(path, is_default)?;
    apply_env_overrides(&mut cfg);
    cfg.validate().map_err(|e| e.to_string())?;
    Ok(cfg)
}

/// Read the file at `path`.  A missing file at the default location is
/// created with defaults; a missing explicit file is an error.
pub(crate) fn load_or_create(path: &Path, is_default: bool) -> Result<Config, String> {
    match load_from(path)? {
        Some(cfg) => Ok(cfg),
        None if is_default => {
            let cfg = Config::default();
            save_to(&cfg, path)?;
            Ok(cfg)
        }
        None => Err(format!("Config file {} does not exist", path.display())),
    }
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `QUADSCAN_*` environment variable overrides to `cfg`.
///
/// Unparseable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `QUADSCAN_OUTPUT_PORT` | `output_port` (empty means stdout) |
/// | `QUADSCAN_OUTPUT_FORMAT` | `output_format` |
/// | `QUADSCAN_MIN_INTENSITY` | `filter.min_intensity` |
/// | `QUADSCAN_APPLY_POSITION_OFFSET` | `apply_position_offset` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("QUADSCAN_OUTPUT_PORT") {
        cfg.output_port = if v.trim().is_empty() { None } else { Some(v) };
    }
    if let Ok(v) = std::env::var("QUADSCAN_OUTPUT_FORMAT")
        && let Ok(format) = v.parse::<OutputFormat>()
    {
        cfg.output_format = format;
    }
    if let Ok(v) = std::env::var("QUADSCAN_MIN_INTENSITY")
        && let Ok(intensity) = v.trim().parse::<u8>()
    {
        cfg.filter.min_intensity = intensity;
    }
    if let Ok(v) = std::env::var("QUADSCAN_APPLY_POSITION_OFFSET") {
        match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => cfg.apply_position_offset = true,
            "0" | "false" | "no" => cfg.apply_position_offset = false,
            _ => {}
        }
    }
}

/// Save the config to a specific path, creating parent directories.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
