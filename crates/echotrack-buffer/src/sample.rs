//! One slot of the timestamped ring.

use echotrack_core::{FieldMap, SampleStatus, VideoFrame};
use glam::DMat4;

/// A single acquired sample: timestamps, identity, status, and payload.
///
/// The ring owns every sample; consumers always receive deep copies. Slot
/// storage is reused across overwrites, so the pixel allocation survives
/// [`StreamSample::reset_for_reuse`].
#[derive(Debug, Clone, Default)]
pub struct StreamSample {
    /// Buffer-lifetime-unique monotone identifier, assigned on append.
    pub uid: u64,
    /// Producer-assigned sequence number; may be non-contiguous.
    pub frame_index: u64,
    /// Smoothed timestamp used for all time-indexed queries, in buffer-local
    /// seconds (no local time offset applied).
    pub filtered_time: f64,
    /// Raw producer timestamp, in buffer-local seconds.
    pub unfiltered_time: f64,
    /// Validity tag.
    pub status: SampleStatus,
    /// Optional pixel payload.
    pub frame: Option<VideoFrame>,
    /// Optional 4x4 homogeneous pose.
    pub matrix: Option<DMat4>,
    /// Free-form string fields.
    pub fields: FieldMap,
    pub(crate) has_valid_transform_data: bool,
}

impl StreamSample {
    /// Filtered timestamp with the buffer's local time offset applied.
    pub fn filtered_timestamp(&self, local_time_offset_sec: f64) -> f64 {
        self.filtered_time + local_time_offset_sec
    }

    /// Unfiltered timestamp with the buffer's local time offset applied.
    pub fn unfiltered_timestamp(&self, local_time_offset_sec: f64) -> f64 {
        self.unfiltered_time + local_time_offset_sec
    }

    /// Insert a field, tracking whether any field carries transform data.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if name.contains("Transform") {
            self.has_valid_transform_data = true;
        }
        self.fields.set(name, value);
    }

    /// Attach a pose matrix.
    pub fn set_matrix(&mut self, matrix: DMat4) {
        self.matrix = Some(matrix);
        self.has_valid_transform_data = true;
    }

    /// True when a matrix was set or any field name contains `Transform`.
    pub fn has_valid_transform_data(&self) -> bool {
        self.has_valid_transform_data
    }

    /// True when the sample carries a non-empty pixel payload.
    pub fn has_valid_video_data(&self) -> bool {
        self.frame.as_ref().is_some_and(|f| !f.is_empty())
    }

    /// Clear per-sample state before the slot is overwritten.
    ///
    /// The pixel allocation is kept so that steady-state appends do not
    /// allocate.
    pub fn reset_for_reuse(&mut self) {
        self.uid = 0;
        self.frame_index = 0;
        self.filtered_time = 0.0;
        self.unfiltered_time = 0.0;
        self.status = SampleStatus::Ok;
        self.matrix = None;
        self.fields.clear();
        self.has_valid_transform_data = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_field_sets_flag() {
        let mut sample = StreamSample::default();
        assert!(!sample.has_valid_transform_data());
        sample.set_field("Comment", "hello");
        assert!(!sample.has_valid_transform_data());
        sample.set_field("ProbeToTrackerTransform", "1 0 0 0");
        assert!(sample.has_valid_transform_data());
    }

    #[test]
    fn test_matrix_sets_flag() {
        let mut sample = StreamSample::default();
        sample.set_matrix(DMat4::IDENTITY);
        assert!(sample.has_valid_transform_data());
    }

    #[test]
    fn test_reset_keeps_pixel_allocation() {
        use echotrack_core::ScalarType;
        let mut sample = StreamSample::default();
        sample.frame = Some(VideoFrame::new([8, 8, 1], ScalarType::U8, 1));
        sample.set_field("ProbeToTrackerTransform", "x");
        sample.reset_for_reuse();
        assert!(sample.frame.is_some());
        assert!(sample.fields.is_empty());
        assert!(!sample.has_valid_transform_data());
    }

    #[test]
    fn test_timestamp_offset() {
        let sample = StreamSample {
            filtered_time: 1.5,
            unfiltered_time: 1.4,
            ..Default::default()
        };
        assert_eq!(sample.filtered_timestamp(10.0), 11.5);
        assert_eq!(sample.unfiltered_timestamp(10.0), 11.4);
    }
}
