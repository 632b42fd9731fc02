//! Batch edit operations over an ordered tracked frame list.
//!
//! Every operation is a pure in-place transform: per-frame failures are
//! logged and the loop continues; argument validation failures abort before
//! anything is modified.

use crate::repository::{RepositoryConfig, TransformRepository};
use echotrack_core::{
    ClipRect, EchoTrackError, FieldStatus, FlipInfo, Result, TransformName,
};
use echotrack_sequence::TrackedFrameList;
use glam::{DMat4, DVec3};
use tracing::{error, info, warn};

/// Sentinel value: write an incrementing scalar into the field.
pub const FIELD_VALUE_FRAME_SCALAR: &str = "{frame-scalar}";
/// Sentinel value: write an accumulating 4x4 transform into the field.
pub const FIELD_VALUE_FRAME_TRANSFORM: &str = "{frame-transform}";

/// Transform attached by the crop operation.
pub fn cropped_image_transform_name() -> TransformName {
    TransformName::new("Image", "CroppedImage")
}

// ── Trim and decimate ───────────────────────────────────────────

/// Retain frames `[first, last]` inclusive.
pub fn trim(list: &mut TrackedFrameList, first: usize, last: usize) -> Result<()> {
    info!(first, last, "trim sequence");
    if first > last || last >= list.len() {
        return Err(EchoTrackError::InvalidParameter(format!(
            "invalid trim range ({first}, {last}); permitted range is (0, {})",
            list.len().saturating_sub(1)
        )));
    }
    if last != list.len() - 1 {
        list.remove_range(last + 1, list.len() - 1)?;
    }
    if first != 0 {
        list.remove_range(0, first - 1)?;
    }
    Ok(())
}

/// Keep every `factor`-th frame.
pub fn decimate(list: &mut TrackedFrameList, factor: usize) -> Result<()> {
    info!(factor, "decimate sequence: keep 1 frame out of every {factor}");
    if factor < 2 {
        return Err(EchoTrackError::InvalidParameter(format!(
            "invalid decimation factor {factor}; it must be an integer of at least 2"
        )));
    }
    let mut index = 0usize;
    list.frames.retain(|_| {
        let keep = index % factor == 0;
        index += 1;
        keep
    });
    Ok(())
}

// ── Frame field updates ─────────────────────────────────────────

/// Parameters of the UPDATE_FRAME_FIELD_NAME / UPDATE_FRAME_FIELD_VALUE
/// operations.
#[derive(Debug, Clone)]
pub struct FrameFieldUpdate {
    /// Field to rename or update.
    pub field_name: String,
    /// New field name; empty to keep the name.
    pub updated_field_name: String,
    /// New field value; empty to keep the value. `{frame-scalar}` and
    /// `{frame-transform}` are substituted per frame.
    pub updated_field_value: String,
    pub frame_scalar_start: f64,
    pub frame_scalar_increment: f64,
    pub frame_scalar_decimal_digits: usize,
    pub frame_transform_start: DMat4,
    pub frame_transform_increment: DMat4,
    /// When set, the transform exponent is read from this per-frame field
    /// instead of accumulating across frames.
    pub frame_transform_index_field_name: Option<String>,
}

impl Default for FrameFieldUpdate {
    fn default() -> Self {
        Self {
            field_name: String::new(),
            updated_field_name: String::new(),
            updated_field_value: String::new(),
            frame_scalar_start: 0.0,
            frame_scalar_increment: 1.0,
            frame_scalar_decimal_digits: 5,
            frame_transform_start: DMat4::IDENTITY,
            frame_transform_increment: DMat4::IDENTITY,
            frame_transform_index_field_name: None,
        }
    }
}

fn matrix_to_string_with_digits(matrix: &DMat4, digits: usize) -> String {
    let mut out = String::with_capacity(16 * (digits + 4));
    for r in 0..4 {
        let row = matrix.row(r);
        for (i, v) in [row.x, row.y, row.z, row.w].into_iter().enumerate() {
            if r > 0 || i > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{v:.digits$}"));
        }
    }
    out
}

/// Rename and/or update a field on every frame.
pub fn update_frame_field(list: &mut TrackedFrameList, update: &FrameFieldUpdate) -> Result<()> {
    info!(
        field = %update.field_name,
        new_name = %update.updated_field_name,
        "update frame field"
    );

    let mut scalar = update.frame_scalar_start;
    let mut running_transform = update.frame_transform_start;

    for (index, frame) in list.iter_mut().enumerate() {
        // Rename first; absence is not an error.
        if !update.field_name.is_empty() && !update.updated_field_name.is_empty() {
            if let Some(value) = frame.fields.remove(&update.field_name) {
                frame.fields.set(update.updated_field_name.clone(), value);
            }
        }

        let target = if update.updated_field_name.is_empty() {
            &update.field_name
        } else {
            &update.updated_field_name
        };
        if target.is_empty() || update.updated_field_value.is_empty() {
            continue;
        }

        if update
            .updated_field_value
            .eq_ignore_ascii_case(FIELD_VALUE_FRAME_SCALAR)
        {
            frame.fields.set(
                target.clone(),
                format!(
                    "{scalar:.digits$}",
                    digits = update.frame_scalar_decimal_digits
                ),
            );
            scalar += update.frame_scalar_increment;
        } else if update
            .updated_field_value
            .eq_ignore_ascii_case(FIELD_VALUE_FRAME_TRANSFORM)
        {
            let matrix = match &update.frame_transform_index_field_name {
                None => {
                    let current = running_transform;
                    running_transform *= update.frame_transform_increment;
                    current
                }
                Some(index_field) => {
                    let exponent = frame
                        .fields
                        .get(index_field)
                        .and_then(|text| text.parse::<u64>().ok())
                        .unwrap_or_else(|| {
                            error!(
                                frame = index,
                                field = %index_field,
                                "cannot retrieve the frame index from the field value"
                            );
                            0
                        });
                    let mut accumulated = update.frame_transform_start;
                    for _ in 0..exponent {
                        accumulated *= update.frame_transform_increment;
                    }
                    accumulated
                }
            };
            frame.fields.set(
                target.clone(),
                matrix_to_string_with_digits(&matrix, update.frame_scalar_decimal_digits),
            );
        } else {
            frame
                .fields
                .set(target.clone(), update.updated_field_value.clone());
        }
    }
    Ok(())
}

/// Remove a field from every frame. Absence is not an error.
pub fn delete_frame_field(list: &mut TrackedFrameList, field_name: &str) -> Result<()> {
    if field_name.is_empty() {
        return Err(EchoTrackError::InvalidParameter(
            "field name is empty".into(),
        ));
    }
    info!(field = field_name, "delete frame field");
    for frame in list.iter_mut() {
        frame.fields.remove(field_name);
    }
    Ok(())
}

// ── List-level field updates ────────────────────────────────────

/// Rename a list-level field. Absence is not an error.
pub fn update_field_name(list: &mut TrackedFrameList, name: &str, new_name: &str) -> Result<()> {
    info!(field = name, new_name, "update field name");
    if let Some(value) = list.fields.remove(name) {
        list.fields.set(new_name, value);
    }
    Ok(())
}

/// Set a list-level field value.
pub fn update_field_value(list: &mut TrackedFrameList, name: &str, value: &str) -> Result<()> {
    info!(field = name, value, "update field value");
    list.fields.set(name, value);
    Ok(())
}

/// Remove a list-level field.
pub fn delete_field(list: &mut TrackedFrameList, name: &str) -> Result<()> {
    info!(field = name, "delete field");
    list.fields.remove(name);
    Ok(())
}

// ── Derived transforms ──────────────────────────────────────────

/// Attach the requested transforms to every frame, resolved through a
/// repository seeded from the configuration and the frame's own transforms.
pub fn add_transforms(
    list: &mut TrackedFrameList,
    names: &[TransformName],
    config: &RepositoryConfig,
) -> Result<()> {
    if names.is_empty() {
        return Err(EchoTrackError::InvalidParameter(
            "no transform names are specified to be added".into(),
        ));
    }

    for (index, frame) in list.iter_mut().enumerate() {
        let mut repository = TransformRepository::from_config(config)?;
        if let Err(err) = repository.set_transforms_from_frame(frame) {
            error!(frame = index, %err, "unable to seed the transform repository");
            return Err(err);
        }

        for name in names {
            match repository.transform(name) {
                Ok((matrix, true)) => {
                    frame.set_transform(name, &matrix);
                    frame.set_transform_status(name, FieldStatus::Ok);
                }
                Ok((_, false)) | Err(_) => {
                    warn!(frame = index, transform = %name, "failed to resolve transform");
                    frame.set_transform(name, &DMat4::IDENTITY);
                    frame.set_transform_status(name, FieldStatus::Invalid);
                }
            }
        }
    }
    Ok(())
}

// ── Image operations ────────────────────────────────────────────

/// Fill a rectangle in every frame's image with a gray level.
pub fn fill_rectangle(
    list: &mut TrackedFrameList,
    origin: [u32; 2],
    size: [u32; 2],
    gray: i32,
) -> Result<()> {
    info!(?origin, ?size, gray, "fill image rectangle");
    for (index, frame) in list.iter_mut().enumerate() {
        let Some(image) = frame.frame.as_mut() else {
            error!(frame = index, "failed to retrieve pixel data, fill rectangle skipped");
            continue;
        };
        if let Err(err) = image.fill_rectangle(origin, size, gray) {
            error!(frame = index, %err, "fill rectangle failed");
        }
    }
    Ok(())
}

/// Crop a rectangle out of every frame's image, with optional axis flips.
///
/// Each frame gains an `ImageToCroppedImage` transform equal to translation
/// by the negated origin.
pub fn crop_rectangle(
    list: &mut TrackedFrameList,
    origin: [u32; 3],
    size: [u32; 3],
    flip: FlipInfo,
) -> Result<()> {
    info!(?origin, ?size, ?flip, "crop image rectangle");
    let name = cropped_image_transform_name();
    let offset = DMat4::from_translation(DVec3::new(
        -f64::from(origin[0]),
        -f64::from(origin[1]),
        -f64::from(origin[2]),
    ));

    for (index, frame) in list.iter_mut().enumerate() {
        let Some(image) = frame.frame.as_mut() else {
            error!(frame = index, "failed to retrieve pixel data, crop skipped");
            continue;
        };
        match image.flipped_clipped(flip, Some(ClipRect { origin, size })) {
            Ok(cropped) => {
                *image = cropped;
                frame.set_transform(&name, &offset);
                frame.set_transform_status(&name, FieldStatus::Ok);
            }
            Err(err) => {
                error!(frame = index, %err, "crop failed");
            }
        }
    }
    Ok(())
}

// ── Reference re-parenting ──────────────────────────────────────

/// Re-parent every `X -> Reference` transform to the tracker.
///
/// With a reference transform `R = Reference -> Tracker`, each frame's
/// `X -> Reference` becomes `X -> Tracker = R * (X -> Reference)` with the
/// same status, and the original transform (plus its status sibling) is
/// deleted.
pub fn update_reference_transform(
    list: &mut TrackedFrameList,
    reference: &TransformName,
) -> Result<()> {
    info!(reference = %reference, "update reference transform");

    for (index, frame) in list.iter_mut().enumerate() {
        let reference_to_tracker = match frame.transform(reference) {
            Ok(matrix) => matrix,
            Err(_) => {
                warn!(
                    frame = index,
                    reference = %reference,
                    "couldn't get the reference transform"
                );
                continue;
            }
        };

        for name in frame.transform_names() {
            // The reference transform itself stays.
            if name == *reference {
                continue;
            }
            if name.to != reference.from {
                continue;
            }

            let tool_to_reference = match frame.transform(&name) {
                Ok(matrix) => matrix,
                Err(err) => {
                    error!(frame = index, transform = %name, %err, "failed to get frame transform");
                    continue;
                }
            };
            let status = frame.transform_status(&name);

            let tool_to_tracker = TransformName::new(name.from.clone(), "Tracker");
            frame.set_transform(&tool_to_tracker, &(reference_to_tracker * tool_to_reference));
            frame.set_transform_status(&tool_to_tracker, status);
            frame.delete_transform(&name);
        }
    }
    Ok(())
}
