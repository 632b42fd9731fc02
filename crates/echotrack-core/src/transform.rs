//! Coordinate transform names and 4x4 matrix helpers.
//!
//! Transforms travel through sequence files as 16 space-separated numbers
//! in row-major order under a field named `<From>To<To>Transform`, with a
//! sibling `<From>To<To>TransformStatus` field.

use crate::error::{EchoTrackError, Result};
use glam::{DMat3, DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to a transform's field name.
pub const TRANSFORM_FIELD_SUFFIX: &str = "Transform";
/// Suffix appended to a transform field name for its status sibling.
pub const TRANSFORM_STATUS_SUFFIX: &str = "Status";

/// A named coordinate transform, e.g. `ProbeToTracker`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformName {
    pub from: String,
    pub to: String,
}

impl TransformName {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Parse `<From>To<To>`, accepting an optional `Transform` suffix.
    ///
    /// The separator is the first `To` that is followed by an uppercase
    /// letter, so names like `StylusTipToTracker` split correctly.
    pub fn parse(name: &str) -> Result<Self> {
        let stripped = name.strip_suffix(TRANSFORM_FIELD_SUFFIX).unwrap_or(name);
        let bytes = stripped.as_bytes();
        for i in 0..bytes.len().saturating_sub(2) {
            if &stripped[i..i + 2] == "To" && bytes[i + 2].is_ascii_uppercase() && i > 0 {
                return Ok(Self {
                    from: stripped[..i].to_string(),
                    to: stripped[i + 2..].to_string(),
                });
            }
        }
        Err(EchoTrackError::InvalidParameter(format!(
            "transform name '{name}' is not of the form <From>To<To>"
        )))
    }

    /// Field name in a sequence frame: `<From>To<To>Transform`.
    pub fn field_name(&self) -> String {
        format!("{}To{}{}", self.from, self.to, TRANSFORM_FIELD_SUFFIX)
    }

    /// Status sibling field name: `<From>To<To>TransformStatus`.
    pub fn status_field_name(&self) -> String {
        format!(
            "{}To{}{}{}",
            self.from, self.to, TRANSFORM_FIELD_SUFFIX, TRANSFORM_STATUS_SUFFIX
        )
    }
}

impl fmt::Display for TransformName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}To{}", self.from, self.to)
    }
}

// ── Matrix helpers ──────────────────────────────────────────────

/// Encode a matrix as 16 space-separated numbers, row-major.
pub fn matrix_to_string(matrix: &DMat4) -> String {
    let mut out = String::with_capacity(16 * 8);
    for r in 0..4 {
        let row = matrix.row(r);
        for (i, v) in [row.x, row.y, row.z, row.w].into_iter().enumerate() {
            if r > 0 || i > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{v}"));
        }
    }
    out
}

/// Parse 16 whitespace-separated numbers (row-major) into a matrix.
pub fn matrix_from_string(text: &str) -> Result<DMat4> {
    let mut values = [0.0f64; 16];
    let mut count = 0;
    for token in text.split_whitespace() {
        if count >= 16 {
            count += 1;
            break;
        }
        values[count] = token.parse::<f64>().map_err(|_| {
            EchoTrackError::InvalidParameter(format!("'{token}' is not a valid matrix element"))
        })?;
        count += 1;
    }
    if count != 16 {
        return Err(EchoTrackError::InvalidParameter(format!(
            "expected 16 matrix elements, got {count}"
        )));
    }
    // from_cols_array takes column-major storage
    Ok(DMat4::from_cols_array(&values).transpose())
}

/// Rotation block of a homogeneous transform as a unit quaternion.
pub fn rotation_quat(matrix: &DMat4) -> DQuat {
    let rot = DMat3::from_cols(
        matrix.x_axis.truncate(),
        matrix.y_axis.truncate(),
        matrix.z_axis.truncate(),
    );
    DQuat::from_mat3(&rot).normalize()
}

/// Translation column of a homogeneous transform.
pub fn translation(matrix: &DMat4) -> DVec3 {
    matrix.w_axis.truncate()
}

/// Build a homogeneous transform from a rotation and a translation.
pub fn compose(rotation: DQuat, translation: DVec3) -> DMat4 {
    let rot = DMat3::from_quat(rotation);
    DMat4::from_cols(
        rot.x_axis.extend(0.0),
        rot.y_axis.extend(0.0),
        rot.z_axis.extend(0.0),
        translation.extend(1.0),
    )
}

/// Angle between the rotation blocks of two transforms, in degrees.
pub fn orientation_difference_deg(a: &DMat4, b: &DMat4) -> f64 {
    rotation_quat(a).angle_between(rotation_quat(b)).to_degrees()
}
