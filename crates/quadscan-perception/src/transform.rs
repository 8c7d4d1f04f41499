//! Geometry Transform.
//!
//! Converts the polar samples of a validated [`RawPacket`] into
//! [`CartesianPoint`]s in the shared reference frame.
//!
//! For sample *i* of *n*:
//!
//! ```text
//! angle_i  = start + i · (end − start) / (n − 1)          (degrees)
//! adjusted = (angle_i + mount_offset) · π/180 − π/2       (radians)
//! x        = −cos(adjusted) · distance
//! y        =  sin(adjusted) · distance
//! ```
//!
//! The −π/2 term aligns the sensor's native polar convention with the shared
//! Cartesian axes and is the same for every device.
//!
//! A packet may straddle the 0°/360° boundary, in which case `end < start`.
//! Interpolation then runs over `end + 360°`, and reported angles are folded
//! back into `[0, 360)`.
//!
//! # Example
//!
//! ```rust
//! use quadscan_perception::transform::{transform, TransformOptions};
//! use quadscan_types::{DeviceCalibration, RawPacket, RawSample};
//!
//! let cal = DeviceCalibration::new(1, 80.0, 0.0, 90.0, "/dev/ttyUSB1");
//! let mut packet = RawPacket::default();
//! packet.samples[0] = RawSample::new(1000, 200);
//!
//! let points = transform(&packet, &cal, TransformOptions::default());
//! assert_eq!(points.len(), 12);
//! assert!((points[0].x_mm + 1000.0).abs() < 1e-3);
//! assert!(points[0].y_mm.abs() < 1e-3);
//! ```

use std::f32::consts::FRAC_PI_2;

use quadscan_types::{CartesianPoint, DeviceCalibration, RawPacket, SAMPLES_PER_PACKET};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Options
// ────────────────────────────────────────────────────────────────────────────

/// Switches for the transform that are not per-device calibration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Translate each point by its device's mounting position after the
    /// rotation, so that every device reports relative to the shared origin.
    /// Off by default: points are then relative to their own sensor.
    #[serde(default)]
    pub apply_position_offset: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Angles
// ────────────────────────────────────────────────────────────────────────────

/// Fold `degrees` into `[0, 360)`.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let folded = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if folded >= 360.0 { 0.0 } else { folded }
}

/// Linearly interpolate the per-sample angles (degrees, not normalised) of a
/// packet spanning `start_cdeg` to `end_cdeg`.
pub fn interpolate_angles(start_cdeg: u16, end_cdeg: u16) -> [f32; SAMPLES_PER_PACKET] {
    let start = f32::from(start_cdeg) / 100.0;
    let mut end = f32::from(end_cdeg) / 100.0;
    if end < start {
        end += 360.0;
    }
    let step = (end - start) / (SAMPLES_PER_PACKET - 1) as f32;

    let mut angles = [0.0f32; SAMPLES_PER_PACKET];
    for (i, angle) in angles.iter_mut().enumerate() {
        *angle = start + i as f32 * step;
    }
    angles
}

/// Project one polar sample into the shared frame.  Returns `(x, y)` in the
/// unit of `distance`.
pub fn polar_to_cartesian(angle_deg: f32, mount_offset_deg: f32, distance: f32) -> (f32, f32) {
    let adjusted = (angle_deg + mount_offset_deg).to_radians() - FRAC_PI_2;
    let (sin, cos) = adjusted.sin_cos();
    (-cos * distance, sin * distance)
}

// ────────────────────────────────────────────────────────────────────────────
// Transform
// ────────────────────────────────────────────────────────────────────────────

/// Convert every sample of `packet` into a [`CartesianPoint`] tagged with
/// `calibration.id`.  The output has one point per sample, in sample order;
/// filtering happens later.
pub fn transform(
    packet: &RawPacket,
    calibration: &DeviceCalibration,
    options: TransformOptions,
) -> Vec<CartesianPoint> {
    let angles = interpolate_angles(packet.start_angle_cdeg, packet.end_angle_cdeg);
    let (dx, dy) = if options.apply_position_offset {
        (calibration.x_offset_mm, calibration.y_offset_mm)
    } else {
        (0.0, 0.0)
    };

    packet
        .samples
        .iter()
        .zip(angles)
        .map(|(sample, angle)| {
            let (x, y) = polar_to_cartesian(
                angle,
                calibration.angle_offset_deg,
                f32::from(sample.distance_mm),
            );
            CartesianPoint {
                device_id: calibration.id,
                angle_deg: normalize_degrees(angle),
                distance_mm: sample.distance_mm,
                x_mm: x + dx,
                y_mm: y + dy,
                intensity: sample.intensity,
            }
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use quadscan_types::RawSample;

    fn calibration(offset_deg: f32) -> DeviceCalibration {
        DeviceCalibration::new(3, -80.0, 0.0, offset_deg, "/dev/ttyUSB3")
    }

    fn uniform_packet(start: u16, end: u16, distance: u16) -> RawPacket {
        RawPacket {
            start_angle_cdeg: start,
            end_angle_cdeg: end,
            samples: [RawSample::new(distance, 200); SAMPLES_PER_PACKET],
            ..RawPacket::default()
        }
    }

    // ── Angles ──────────────────────────────────────────────────────────────

    #[test]
    fn interpolation_spans_start_to_end() {
        let angles = interpolate_angles(0, 1100);
        for (i, angle) in angles.iter().enumerate() {
            let expected = i as f32 * (1100.0 / 100.0) / 11.0;
            assert!((angle - expected).abs() < 1e-5, "sample {i}: {angle}");
        }
        assert_eq!(angles[0], 0.0);
        assert!((angles[11] - 11.0).abs() < 1e-5);
    }

    #[test]
    fn interpolation_with_equal_bounds_is_flat() {
        let angles = interpolate_angles(4500, 4500);
        assert!(angles.iter().all(|a| (a - 45.0).abs() < 1e-5));
    }

    #[test]
    fn interpolation_wraps_past_360() {
        // 359° → 1°: a 2° span crossing zero, not a 358° backwards sweep.
        let angles = interpolate_angles(35900, 100);
        assert!((angles[0] - 359.0).abs() < 1e-4);
        assert!((angles[11] - 361.0).abs() < 1e-4);
        for pair in angles.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn normalize_folds_into_range() {
        assert!((normalize_degrees(361.0) - 1.0).abs() < 1e-4);
        assert!((normalize_degrees(-90.0) - 270.0).abs() < 1e-4);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-1e-9), 0.0);
    }

    // ── Projection ──────────────────────────────────────────────────────────

    #[test]
    fn zero_angle_points_along_negative_y() {
        // adjusted = −π/2 → x = −cos(−π/2)·d ≈ 0, y = sin(−π/2)·d = −d
        let (x, y) = polar_to_cartesian(0.0, 0.0, 1000.0);
        assert!(x.abs() < 1e-3, "x={x}");
        assert!((y + 1000.0).abs() < 1e-3, "y={y}");
    }

    #[test]
    fn mount_offset_rotates_point() {
        // 90° offset: adjusted = 0 → (−d, 0)
        let (x, y) = polar_to_cartesian(0.0, 90.0, 1000.0);
        assert!((x + 1000.0).abs() < 1e-3, "x={x}");
        assert!(y.abs() < 1e-3, "y={y}");

        // 180° offset: adjusted = π/2 → (0, d)
        let (x, y) = polar_to_cartesian(0.0, 180.0, 1000.0);
        assert!(x.abs() < 1e-3, "x={x}");
        assert!((y - 1000.0).abs() < 1e-3, "y={y}");
    }

    #[test]
    fn projection_preserves_range() {
        for deg in (0..360).step_by(15) {
            let (x, y) = polar_to_cartesian(deg as f32, 45.0, 750.0);
            assert!(((x * x + y * y).sqrt() - 750.0).abs() < 1e-2);
        }
    }

    // ── transform ───────────────────────────────────────────────────────────

    #[test]
    fn transform_emits_one_point_per_sample() {
        let packet = uniform_packet(0, 1100, 1000);
        let points = transform(&packet, &calibration(0.0), TransformOptions::default());
        assert_eq!(points.len(), SAMPLES_PER_PACKET);
        assert!(points.iter().all(|p| p.device_id == 3));
        assert!(
            points
                .iter()
                .all(|p| p.intensity == 200 && p.distance_mm == 1000)
        );
        assert!((points[5].angle_deg - 5.0).abs() < 1e-4);
    }

    #[test]
    fn transform_reports_angles_before_mount_offset() {
        let packet = uniform_packet(1000, 2100, 1000);
        let points = transform(&packet, &calibration(270.0), TransformOptions::default());
        assert!((points[0].angle_deg - 10.0).abs() < 1e-4);
        assert!((points[11].angle_deg - 21.0).abs() < 1e-4);
    }

    #[test]
    fn transform_normalizes_wrapped_angles() {
        let packet = uniform_packet(35950, 500, 1000);
        let points = transform(&packet, &calibration(0.0), TransformOptions::default());
        assert!((points[0].angle_deg - 359.5).abs() < 1e-3);
        assert!((points[11].angle_deg - 5.0).abs() < 1e-3);
        assert!(points.iter().all(|p| (0.0..360.0).contains(&p.angle_deg)));
    }

    #[test]
    fn position_offset_is_off_by_default() {
        let packet = uniform_packet(0, 0, 1000);
        let points = transform(&packet, &calibration(90.0), TransformOptions::default());
        assert!((points[0].x_mm + 1000.0).abs() < 1e-3);
    }

    #[test]
    fn position_offset_translates_after_rotation() {
        let packet = uniform_packet(0, 0, 1000);
        let options = TransformOptions {
            apply_position_offset: true,
        };
        let points = transform(&packet, &calibration(90.0), options);
        // (−1000, 0) rotated, then shifted by the (−80, 0) mount position.
        assert!(
            (points[0].x_mm + 1080.0).abs() < 1e-3,
            "x={}",
            points[0].x_mm
        );
        assert!(points[0].y_mm.abs() < 1e-3);
    }

    #[test]
    fn zero_distance_maps_to_sensor_origin() {
        let packet = uniform_packet(0, 1100, 0);
        let points = transform(&packet, &calibration(45.0), TransformOptions::default());
        assert!(
            points
                .iter()
                .all(|p| p.x_mm.abs() < 1e-6 && p.y_mm.abs() < 1e-6)
        );
    }
}
