//! Temporal interpolation between two neighbouring samples.
//!
//! Rotation is interpolated with SLERP between the unit quaternions of the
//! two pose matrices; translation and the unfiltered timestamp are blended
//! linearly. Everything else (fields, frame index, pixel payload) is taken
//! from the sample closest to the requested time.

use crate::sample::StreamSample;
use echotrack_core::transform::{compose, orientation_difference_deg, rotation_quat, translation};
use glam::DMat4;
use tracing::warn;

/// Orientation gap beyond which the linear weighting is suspect.
const ANGLE_WARNING_THRESHOLD_DEG: f64 = 10.0;

/// Synthesise a sample at `local_time` from neighbours `a` (closest to the
/// requested time) and `b` (closest on the opposite side).
///
/// `local_time` is in buffer-local seconds; the caller converts from the
/// consumer-facing clock before calling.
pub fn interpolate_between(a: &StreamSample, b: &StreamSample, local_time: f64) -> StreamSample {
    let time_a = a.filtered_time;
    let time_b = b.filtered_time;

    let weight_a = (time_b - local_time).abs() / (time_a - time_b).abs();
    let weight_b = 1.0 - weight_a;

    let matrix_a = a.matrix.unwrap_or(DMat4::IDENTITY);
    let matrix_b = b.matrix.unwrap_or(DMat4::IDENTITY);

    // SLERP runs from A (parameter 0) to B (parameter 1).
    let rotation = rotation_quat(&matrix_a).slerp(rotation_quat(&matrix_b), weight_b);
    let position = translation(&matrix_a) * weight_a + translation(&matrix_b) * weight_b;
    let interpolated = compose(rotation, position);

    let mut out = a.clone();
    out.set_matrix(interpolated);
    out.filtered_time = local_time;
    out.unfiltered_time = a.unfiltered_time * weight_a + b.unfiltered_time * weight_b;

    let angle_a = orientation_difference_deg(&interpolated, &matrix_a).abs();
    let angle_b = orientation_difference_deg(&interpolated, &matrix_b).abs();
    if angle_a > ANGLE_WARNING_THRESHOLD_DEG && angle_b > ANGLE_WARNING_THRESHOLD_DEG {
        warn!(
            angle_to_a_deg = angle_a,
            angle_to_b_deg = angle_b,
            "interpolated orientation is far from both neighbours; the tracked \
             motion is too fast for accurate interpolation"
        );
    }

    out
}
