//! Quality Filter – accepts or rejects individual samples by range and
//! return intensity.
//!
//! All three bounds are strict: a sample sitting exactly on a threshold is
//! rejected.  Rejection is a normal outcome, not an error, and is silent.

use quadscan_types::RawSample;
use serde::{Deserialize, Serialize};

/// Sample acceptance thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityFilter {
    /// Samples must be strictly farther than this (millimetres).
    #[serde(default = "default_min_distance")]
    pub min_distance_mm: u16,
    /// Samples must be strictly nearer than this (millimetres).
    #[serde(default = "default_max_distance")]
    pub max_distance_mm: u16,
    /// Samples must return strictly more than this intensity.
    #[serde(default = "default_min_intensity")]
    pub min_intensity: u8,
}

fn default_min_distance() -> u16 {
    100
}
fn default_max_distance() -> u16 {
    2500
}
fn default_min_intensity() -> u8 {
    150
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self {
            min_distance_mm: default_min_distance(),
            max_distance_mm: default_max_distance(),
            min_intensity: default_min_intensity(),
        }
    }
}

impl QualityFilter {
    pub fn new(min_distance_mm: u16, max_distance_mm: u16, min_intensity: u8) -> Self {
        Self {
            min_distance_mm,
            max_distance_mm,
            min_intensity,
        }
    }

    /// `true` when `sample` lies strictly inside every bound.
    pub fn accept(&self, sample: &RawSample) -> bool {
        sample.distance_mm > self.min_distance_mm
            && sample.distance_mm < self.max_distance_mm
            && sample.intensity > self.min_intensity
    }
}
