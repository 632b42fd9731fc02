//! Bulk import/export between tracked frame lists and the data buffer.
//!
//! Import reconfigures the buffer from the first source frame, raises its
//! capacity to the frame count, and pushes every frame through the normal
//! append path under one of three timestamp-handling modes. Export walks the
//! ring from the oldest to the latest UID and synthesises the reserved
//! `Timestamp`, `UnfilteredTimestamp`, and `FrameNumber` fields.

use crate::frame_list::{TrackedFrame, TrackedFrameList};
use echotrack_buffer::{DataBuffer, SampleTimes};
use echotrack_core::fields::{FIELD_FRAME_NUMBER, FIELD_TIMESTAMP, FIELD_UNFILTERED_TIMESTAMP};
use echotrack_core::{
    EchoTrackError, FieldMap, FieldStatus, Result, SampleStatus, TransformName,
};
use glam::DMat4;
use tracing::{debug, error, warn};

/// How source timestamps are carried into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampMode {
    /// Both timestamps are required in the source and appended verbatim.
    #[default]
    ReadFilteredAndUnfiltered,
    /// The unfiltered timestamp is required; the filtered one is re-derived
    /// by the buffer's timestamp filter (frame numbers required too).
    ReadUnfilteredComputeFiltered,
    /// The filtered timestamp is required and used as both.
    ReadFilteredIgnoreUnfiltered,
}

impl TimestampMode {
    fn requires_timestamp(self) -> bool {
        matches!(
            self,
            Self::ReadFilteredAndUnfiltered | Self::ReadFilteredIgnoreUnfiltered
        )
    }

    fn requires_unfiltered_timestamp(self) -> bool {
        matches!(
            self,
            Self::ReadFilteredAndUnfiltered | Self::ReadUnfilteredComputeFiltered
        )
    }

    fn requires_frame_number(self) -> bool {
        matches!(self, Self::ReadUnfilteredComputeFiltered)
    }

    fn sample_times(self, timestamp: f64, unfiltered: f64) -> SampleTimes {
        match self {
            Self::ReadFilteredAndUnfiltered => SampleTimes::both(unfiltered, timestamp),
            Self::ReadUnfilteredComputeFiltered => SampleTimes::unfiltered(unfiltered),
            Self::ReadFilteredIgnoreUnfiltered => SampleTimes::both(timestamp, timestamp),
        }
    }
}

/// Name under which export records the pose of each sample.
pub fn exported_transform_name() -> TransformName {
    TransformName::new("Tool", "Tracker")
}

struct ParsedFrameHeader {
    timestamp: f64,
    unfiltered: f64,
    frame_number: u64,
}

/// Parse the reserved fields of one source frame under the mode's
/// requirements. `Err` carries a description for the error counter.
fn parse_frame_header(
    frame: &TrackedFrame,
    index: usize,
    mode: TimestampMode,
) -> std::result::Result<ParsedFrameHeader, String> {
    let timestamp = match frame.fields.get_ci(FIELD_TIMESTAMP) {
        Some(text) => match text.parse::<f64>() {
            Ok(value) => value,
            Err(_) if mode.requires_timestamp() => {
                return Err(format!(
                    "unable to convert Timestamp '{text}' to a number for frame #{index}"
                ));
            }
            Err(_) => 0.0,
        },
        None if mode.requires_timestamp() => {
            return Err(format!("unable to read the Timestamp field of frame #{index}"));
        }
        None => 0.0,
    };

    let unfiltered = match frame.fields.get_ci(FIELD_UNFILTERED_TIMESTAMP) {
        Some(text) => match text.parse::<f64>() {
            Ok(value) => value,
            Err(_) if mode.requires_unfiltered_timestamp() => {
                return Err(format!(
                    "unable to convert UnfilteredTimestamp '{text}' to a number for frame #{index}"
                ));
            }
            Err(_) => 0.0,
        },
        None if mode.requires_unfiltered_timestamp() => {
            return Err(format!(
                "unable to read the UnfilteredTimestamp field of frame #{index}"
            ));
        }
        None => 0.0,
    };

    let frame_number = match frame.fields.get_ci(FIELD_FRAME_NUMBER) {
        Some(text) => match text.parse::<u64>() {
            Ok(value) => value,
            Err(_) if mode.requires_frame_number() => {
                return Err(format!(
                    "unable to convert FrameNumber '{text}' to an integer for frame #{index}"
                ));
            }
            Err(_) => 0,
        },
        None if mode.requires_frame_number() => {
            return Err(format!(
                "unable to read the FrameNumber field of frame #{index}"
            ));
        }
        None => 0,
    };

    Ok(ParsedFrameHeader {
        timestamp,
        unfiltered,
        frame_number,
    })
}

fn is_reserved_field(name: &str) -> bool {
    name.eq_ignore_ascii_case(FIELD_TIMESTAMP)
        || name.eq_ignore_ascii_case(FIELD_UNFILTERED_TIMESTAMP)
        || name.eq_ignore_ascii_case(FIELD_FRAME_NUMBER)
}

/// Import every frame's image (and fields) into the buffer.
///
/// The buffer's pixel format is reconfigured from the first source frame
/// and its capacity raised to the frame count. Per-frame errors are logged
/// and counted; the loop continues and a single failure is reported at the
/// end.
pub fn copy_frames_to_buffer(
    list: &TrackedFrameList,
    buffer: &mut DataBuffer,
    mode: TimestampMode,
    copy_fields: bool,
) -> Result<()> {
    let first_image = list
        .get(0)
        .and_then(|frame| frame.frame.as_ref())
        .ok_or_else(|| {
            EchoTrackError::InvalidParameter(
                "cannot import: the source list holds no image data".into(),
            )
        })?;

    buffer.set_frame_size(first_image.size)?;
    buffer.set_scalar_type(first_image.scalar_type);
    buffer.set_components(first_image.components);
    buffer.set_capacity(list.len())?;

    debug!(
        buffer = %buffer.name(),
        frames = list.len(),
        "copying images from a tracked frame list"
    );

    let mut error_count = 0usize;
    for (index, frame) in list.iter().enumerate() {
        let header = match parse_frame_header(frame, index, mode) {
            Ok(header) => header,
            Err(message) => {
                error!(buffer = %buffer.name(), "{message}");
                error_count += 1;
                continue;
            }
        };

        let Some(image) = frame.frame.as_ref() else {
            error!(
                buffer = %buffer.name(),
                "unable to read the image data of frame #{index}"
            );
            error_count += 1;
            continue;
        };

        let custom_fields: FieldMap = if copy_fields {
            frame
                .fields
                .iter()
                .filter(|(name, _)| !is_reserved_field(name))
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect()
        } else {
            FieldMap::new()
        };

        let times = mode.sample_times(header.timestamp, header.unfiltered);
        if let Err(err) = buffer.add_video_frame(
            image,
            header.frame_number,
            None,
            times,
            Some(&custom_fields),
        ) {
            warn!(
                buffer = %buffer.name(),
                frame = index,
                %err,
                "failed to add a video frame from the sequence"
            );
        }
    }

    if error_count > 0 {
        return Err(EchoTrackError::InvalidParameter(format!(
            "{error_count} frames could not be imported"
        )));
    }
    Ok(())
}

/// Import one named transform from every frame into the buffer.
pub fn copy_transform_to_buffer(
    list: &TrackedFrameList,
    buffer: &mut DataBuffer,
    mode: TimestampMode,
    name: &TransformName,
) -> Result<()> {
    buffer.set_capacity(list.len() + 1)?;

    let mut error_count = 0usize;
    for (index, frame) in list.iter().enumerate() {
        let header = match parse_frame_header(frame, index, mode) {
            Ok(header) => header,
            Err(message) => {
                error!(buffer = %buffer.name(), "{message}");
                error_count += 1;
                continue;
            }
        };

        let matrix = match frame.transform(name) {
            Ok(matrix) => matrix,
            Err(_) => {
                error!(
                    buffer = %buffer.name(),
                    "unable to get the {name} transform of frame #{index}"
                );
                error_count += 1;
                continue;
            }
        };

        let status = match frame.transform_status(name) {
            FieldStatus::Ok => SampleStatus::Ok,
            FieldStatus::Invalid => SampleStatus::Missing,
        };

        let times = mode.sample_times(header.timestamp, header.unfiltered);
        if let Err(err) = buffer.add_matrix(matrix, status, header.frame_number, times, None) {
            warn!(
                buffer = %buffer.name(),
                frame = index,
                %err,
                "failed to add a transform from the sequence"
            );
        }
    }

    if error_count > 0 {
        return Err(EchoTrackError::InvalidParameter(format!(
            "{error_count} transforms could not be imported"
        )));
    }
    Ok(())
}

/// Export every sample between the oldest and latest UID into a fresh list.
pub fn export_buffer(buffer: &DataBuffer, timestamp_digits: usize) -> TrackedFrameList {
    let offset = buffer.local_time_offset_sec();
    let tool_to_tracker = exported_transform_name();
    let mut list = TrackedFrameList::new();

    for sample in buffer.items_snapshot() {
        let mut frame = TrackedFrame::new();

        frame.frame = sample.frame.clone();

        frame.set_transform(
            &tool_to_tracker,
            &sample.matrix.unwrap_or(DMat4::IDENTITY),
        );
        frame.set_transform_status(&tool_to_tracker, FieldStatus::from(sample.status));

        for (name, value) in sample.fields.iter() {
            frame.fields.set(name, value);
        }

        frame.set_timestamp_with_digits(sample.filtered_timestamp(offset), timestamp_digits);
        frame.fields.set(
            FIELD_UNFILTERED_TIMESTAMP,
            format!(
                "{:.digits$}",
                sample.unfiltered_timestamp(offset),
                digits = timestamp_digits
            ),
        );
        frame
            .fields
            .set(FIELD_FRAME_NUMBER, sample.frame_index.to_string());

        list.push(frame);
    }
    list
}
