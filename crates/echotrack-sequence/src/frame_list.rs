//! Ordered lists of tracked frames exchanged with sequence files.
//!
//! A tracked frame is the flat, codec-facing form of a sample: a string
//! field map plus an optional pixel block. Transforms are encoded in the
//! field map as 16 space-separated numbers under `<From>To<To>Transform`
//! with a `...TransformStatus` sibling.

use echotrack_core::fields::{FIELD_FRAME_NUMBER, FIELD_TIMESTAMP, FIELD_UNFILTERED_TIMESTAMP};
use echotrack_core::transform::{
    matrix_from_string, matrix_to_string, TRANSFORM_FIELD_SUFFIX, TRANSFORM_STATUS_SUFFIX,
};
use echotrack_core::{
    EchoTrackError, FieldMap, FieldStatus, Result, TransformName, VideoFrame,
};
use glam::DMat4;
use serde::{Deserialize, Serialize};

/// Decimal digits written for the reserved timestamp fields.
pub const DEFAULT_TIMESTAMP_DIGITS: usize = 6;

/// One frame of an ordered sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackedFrame {
    /// Free-form string fields, including encoded transforms.
    pub fields: FieldMap,
    /// Optional pixel payload.
    pub frame: Option<VideoFrame>,
}

impl TrackedFrame {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Reserved fields ─────────────────────────────────────────

    /// Filtered timestamp parsed from the `Timestamp` field.
    pub fn timestamp(&self) -> Option<f64> {
        self.fields.get_ci(FIELD_TIMESTAMP)?.parse().ok()
    }

    pub fn set_timestamp(&mut self, timestamp: f64) {
        self.set_timestamp_with_digits(timestamp, DEFAULT_TIMESTAMP_DIGITS);
    }

    pub fn set_timestamp_with_digits(&mut self, timestamp: f64, digits: usize) {
        self.fields
            .set(FIELD_TIMESTAMP, format!("{timestamp:.digits$}"));
    }

    /// Raw timestamp parsed from the `UnfilteredTimestamp` field.
    pub fn unfiltered_timestamp(&self) -> Option<f64> {
        self.fields.get_ci(FIELD_UNFILTERED_TIMESTAMP)?.parse().ok()
    }

    /// Producer frame number parsed from the `FrameNumber` field.
    pub fn frame_number(&self) -> Option<u64> {
        self.fields.get_ci(FIELD_FRAME_NUMBER)?.parse().ok()
    }

    // ── Transforms ──────────────────────────────────────────────

    /// Decode the named transform from its field.
    pub fn transform(&self, name: &TransformName) -> Result<DMat4> {
        let value = self.fields.get(&name.field_name()).ok_or_else(|| {
            EchoTrackError::NotFound(format!("frame has no {name} transform"))
        })?;
        matrix_from_string(value)
    }

    /// Encode a transform into its field.
    pub fn set_transform(&mut self, name: &TransformName, matrix: &DMat4) {
        self.fields.set(name.field_name(), matrix_to_string(matrix));
    }

    /// Status of the named transform; `Ok` when the sibling field is absent.
    pub fn transform_status(&self, name: &TransformName) -> FieldStatus {
        self.fields
            .get(&name.status_field_name())
            .map(FieldStatus::from_field_value)
            .unwrap_or_default()
    }

    pub fn set_transform_status(&mut self, name: &TransformName, status: FieldStatus) {
        self.fields.set(name.status_field_name(), status.as_str());
    }

    /// Remove a transform and its status sibling.
    pub fn delete_transform(&mut self, name: &TransformName) {
        self.fields.remove(&name.field_name());
        self.fields.remove(&name.status_field_name());
    }

    /// Every transform encoded in this frame's fields.
    pub fn transform_names(&self) -> Vec<TransformName> {
        self.fields
            .names()
            .filter(|field| {
                field.ends_with(TRANSFORM_FIELD_SUFFIX)
                    && !field.ends_with(&format!(
                        "{TRANSFORM_FIELD_SUFFIX}{TRANSFORM_STATUS_SUFFIX}"
                    ))
            })
            .filter_map(|field| TransformName::parse(field).ok())
            .collect()
    }
}

/// An ordered sequence of tracked frames plus list-level fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackedFrameList {
    pub frames: Vec<TrackedFrame>,
    /// Fields that apply to the whole sequence rather than one frame.
    pub fields: FieldMap,
}

impl TrackedFrameList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrackedFrame> {
        self.frames.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TrackedFrame> {
        self.frames.get_mut(index)
    }

    pub fn push(&mut self, frame: TrackedFrame) {
        self.frames.push(frame);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrackedFrame> {
        self.frames.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, TrackedFrame> {
        self.frames.iter_mut()
    }

    /// Remove frames `[first, last]` inclusive.
    pub fn remove_range(&mut self, first: usize, last: usize) -> Result<()> {
        if first > last || last >= self.frames.len() {
            return Err(EchoTrackError::InvalidParameter(format!(
                "invalid frame range ({first}, {last}); permitted range is (0, {})",
                self.frames.len().saturating_sub(1)
            )));
        }
        self.frames.drain(first..=last);
        Ok(())
    }

    /// Timestamp of the last frame, if any frame carries one.
    pub fn last_timestamp(&self) -> Option<f64> {
        self.frames.last().and_then(TrackedFrame::timestamp)
    }

    /// Append another list's frames.
    ///
    /// With `rebase_timestamps`, every appended timestamp is shifted by this
    /// list's last timestamp so the merged timeline stays monotone. When
    /// this list is empty the shift is zero, so merging a single input is a
    /// no-op.
    pub fn append_list(&mut self, mut other: TrackedFrameList, rebase_timestamps: bool) {
        if rebase_timestamps {
            let offset = self.last_timestamp().unwrap_or(0.0);
            if offset != 0.0 {
                for frame in other.iter_mut() {
                    if let Some(t) = frame.timestamp() {
                        frame.set_timestamp(t + offset);
                    }
                }
            }
        }
        self.frames.append(&mut other.frames);
    }
}

impl<'a> IntoIterator for &'a TrackedFrameList {
    type Item = &'a TrackedFrame;
    type IntoIter = std::slice::Iter<'a, TrackedFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
