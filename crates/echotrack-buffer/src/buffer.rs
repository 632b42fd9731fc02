//! The buffer façade combining the ring and the timestamp filter.
//!
//! Producers append pixel frames, pose matrices, or bare field maps;
//! consumers query by UID or by time. All timestamps stored in the ring are
//! buffer-local; the configurable local time offset is added on the way out
//! and subtracted on the way in.

use crate::filter::{TimestampFilter, TimestampReportEntry};
use crate::interpolate::interpolate_between;
use crate::ring::{RetrieveError, TimestampedRing, DEFAULT_RING_CAPACITY};
use crate::sample::StreamSample;
use echotrack_core::{
    clock, ClipRect, EchoTrackError, FieldMap, ImageOrientation, ImageType, Result, SampleStatus,
    ScalarType, VideoFrame, NEGLIGIBLE_TIME_DIFFERENCE_SEC,
};
use glam::DMat4;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Interpolation refused beyond this gap by default (seconds).
pub const DEFAULT_MAX_ALLOWED_TIME_DIFFERENCE_SEC: f64 = 0.5;

/// How `DataBuffer::item_from_time` resolves a time to a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemporalInterpolation {
    /// The sample must match the requested time within 10 microseconds.
    Exact,
    /// The sample closest in time, unconditionally.
    Closest,
    /// SLERP/linear interpolation between the two neighbouring samples.
    #[default]
    Interpolated,
}

/// What happened to an append that did not fail.
///
/// `Dropped` covers every silent-recovery path: the filter flagged the
/// timestamp invalid, the ring rejected a stale timestamp, or the payload
/// was an empty field map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The sample was stored under this UID.
    Added { uid: u64 },
    /// The sample was silently discarded.
    Dropped,
}

/// Optional producer-supplied timestamps for an append.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleTimes {
    /// Raw producer timestamp; stamped with the system clock when absent.
    pub unfiltered: Option<f64>,
    /// Pre-computed filtered timestamp; derived by the filter when absent.
    pub filtered: Option<f64>,
}

impl SampleTimes {
    /// Stamp with the system clock and let the filter derive the rest.
    pub fn now() -> Self {
        Self::default()
    }

    pub fn unfiltered(unfiltered: f64) -> Self {
        Self {
            unfiltered: Some(unfiltered),
            filtered: None,
        }
    }

    pub fn both(unfiltered: f64, filtered: f64) -> Self {
        Self {
            unfiltered: Some(unfiltered),
            filtered: Some(filtered),
        }
    }
}

/// Bounded, time-indexed buffer of acquired samples.
pub struct DataBuffer {
    /// Descriptive name used to prefix log output.
    name: String,
    ring: Mutex<TimestampedRing>,
    filter: Mutex<TimestampFilter>,
    frame_size: [u32; 3],
    scalar_type: ScalarType,
    components: u32,
    image_type: ImageType,
    orientation: ImageOrientation,
    local_time_offset_sec: f64,
    max_allowed_time_difference_sec: f64,
}

impl DataBuffer {
    /// Create a buffer with the default capacity and pixel format.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ring: Mutex::new(TimestampedRing::new(DEFAULT_RING_CAPACITY)),
            filter: Mutex::new(TimestampFilter::default()),
            frame_size: [0, 0, 1],
            scalar_type: ScalarType::U8,
            components: 1,
            image_type: ImageType::Brightness,
            orientation: ImageOrientation::Mf,
            local_time_offset_sec: 0.0,
            max_allowed_time_difference_sec: DEFAULT_MAX_ALLOWED_TIME_DIFFERENCE_SEC,
        }
    }

    fn lock_ring(&self) -> MutexGuard<'_, TimestampedRing> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_filter(&self) -> MutexGuard<'_, TimestampFilter> {
        self.filter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Configuration ───────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_size(&self) -> [u32; 3] {
        self.frame_size
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    pub fn components(&self) -> u32 {
        self.components
    }

    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    pub fn image_orientation(&self) -> ImageOrientation {
        self.orientation
    }

    pub fn local_time_offset_sec(&self) -> f64 {
        self.local_time_offset_sec
    }

    pub fn set_local_time_offset_sec(&mut self, offset_sec: f64) {
        self.local_time_offset_sec = offset_sec;
    }

    pub fn max_allowed_time_difference_sec(&self) -> f64 {
        self.max_allowed_time_difference_sec
    }

    pub fn set_max_allowed_time_difference_sec(&mut self, max_sec: f64) {
        self.max_allowed_time_difference_sec = max_sec;
    }

    /// Change the target frame size; every slot is re-allocated.
    pub fn set_frame_size(&mut self, size: [u32; 3]) -> Result<()> {
        let mut size = size;
        if size[0] != 0 && size[1] != 0 && size[2] == 0 {
            warn!(buffer = %self.name, "single slice images should have a depth of 1");
            size[2] = 1;
        }
        if size == self.frame_size {
            return Ok(());
        }
        self.frame_size = size;
        self.allocate_frames();
        Ok(())
    }

    /// Change the pixel scalar type; every slot is re-allocated.
    pub fn set_scalar_type(&mut self, scalar_type: ScalarType) {
        if scalar_type == self.scalar_type {
            return;
        }
        self.scalar_type = scalar_type;
        self.allocate_frames();
    }

    /// Change the components per pixel; every slot is re-allocated.
    pub fn set_components(&mut self, components: u32) {
        if components == self.components {
            return;
        }
        self.components = components;
        self.allocate_frames();
    }

    pub fn set_image_type(&mut self, image_type: ImageType) {
        self.image_type = image_type;
    }

    /// Change the target orientation; allocated slots are retagged.
    pub fn set_image_orientation(&mut self, orientation: ImageOrientation) {
        self.orientation = orientation;
        let mut ring = self.lock_ring();
        for slot in ring.slots_mut() {
            if let Some(frame) = slot.frame.as_mut() {
                frame.orientation = orientation;
            }
        }
    }

    /// Change the ring capacity. Prior contents are discarded; on failure
    /// the previous capacity is kept.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        self.lock_ring().resize(capacity)?;
        self.allocate_frames();
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.lock_ring().capacity()
    }

    pub fn num_items(&self) -> usize {
        self.lock_ring().num_items()
    }

    pub fn oldest_uid(&self) -> u64 {
        self.lock_ring().oldest_uid()
    }

    pub fn latest_uid(&self) -> u64 {
        self.lock_ring().latest_uid()
    }

    /// Number of recent samples used by the timestamp filter.
    pub fn set_averaged_items_for_filtering(&mut self, count: usize) {
        self.lock_filter().set_window_size(count);
    }

    pub fn set_timestamp_reporting(&mut self, enable: bool) {
        self.lock_filter().set_reporting(enable);
    }

    /// Diagnostic (index, raw, filtered) triples recorded so far.
    pub fn timestamp_report(&self) -> Vec<TimestampReportEntry> {
        self.lock_filter().report().to_vec()
    }

    /// Drop every sample and the filter window. UIDs keep increasing.
    pub fn clear(&mut self) {
        self.lock_ring().clear();
        self.lock_filter().clear();
    }

    /// Replace contents and configuration with a deep copy of `source`.
    pub fn deep_copy(&mut self, source: &DataBuffer) {
        {
            let source_ring = source.lock_ring();
            self.lock_ring().deep_copy(&source_ring);
        }
        {
            let source_filter = source.lock_filter();
            self.lock_filter().clone_from(&source_filter);
        }
        self.frame_size = source.frame_size;
        self.scalar_type = source.scalar_type;
        self.components = source.components;
        self.image_type = source.image_type;
        self.orientation = source.orientation;
        self.local_time_offset_sec = source.local_time_offset_sec;
        self.max_allowed_time_difference_sec = source.max_allowed_time_difference_sec;
    }

    /// Pre-allocate every slot's pixel buffer to the configured format so
    /// that steady-state appends perform no allocation.
    fn allocate_frames(&mut self) {
        let size = self.frame_size;
        let scalar = self.scalar_type;
        let components = self.components;
        let orientation = self.orientation;
        let mut ring = self.lock_ring();
        for slot in ring.slots_mut() {
            let frame = slot.frame.get_or_insert_with(VideoFrame::default);
            frame.allocate(size, scalar, components);
            frame.orientation = orientation;
        }
    }

    // ── Append path ─────────────────────────────────────────────

    /// Resolve the two timestamps for an append. `None` means the filter
    /// flagged the sample and it should be silently dropped.
    fn resolve_timestamps(&self, frame_index: u64, times: SampleTimes) -> Option<(f64, f64)> {
        let unfiltered = times.unfiltered.unwrap_or_else(clock::now_seconds);
        match times.filtered {
            Some(filtered) => {
                self.lock_filter()
                    .add_to_report(frame_index, unfiltered, filtered);
                Some((unfiltered, filtered))
            }
            None => {
                let out = self.lock_filter().filter(frame_index, unfiltered);
                if !out.probably_valid {
                    info!(
                        buffer = %self.name,
                        frame_index,
                        raw_time = unfiltered,
                        "filtered timestamp is probably invalid; the item may carry an \
                         inaccurate timestamp and will not be recorded"
                    );
                    return None;
                }
                Some((unfiltered, out.time))
            }
        }
    }

    /// Append a raw pixel frame.
    ///
    /// The producer's orientation is converted to the buffer's target
    /// orientation, the optional clip rectangle applied, and the resulting
    /// geometry must match the configured format exactly.
    #[allow(clippy::too_many_arguments)]
    pub fn add_frame(
        &self,
        pixels: &[u8],
        orientation: ImageOrientation,
        input_size: [u32; 3],
        scalar_type: ScalarType,
        components: u32,
        image_type: ImageType,
        skip_bytes: usize,
        frame_index: u64,
        clip: Option<ClipRect>,
        times: SampleTimes,
        fields: Option<&FieldMap>,
    ) -> Result<AppendOutcome> {
        let Some((unfiltered, filtered)) = self.resolve_timestamps(frame_index, times) else {
            return Ok(AppendOutcome::Dropped);
        };

        if let Some(rect) = clip {
            for axis in 0..3 {
                if rect.size[axis] == 0
                    || rect.origin[axis] + rect.size[axis] > input_size[axis]
                {
                    return Err(EchoTrackError::InvalidParameter(format!(
                        "clip rectangle {:?}+{:?} does not fit the input frame size {:?}",
                        rect.origin, rect.size, input_size
                    )));
                }
            }
        }

        let output_size = VideoFrame::oriented_output_size(input_size, clip);
        if output_size != self.frame_size
            || scalar_type != self.scalar_type
            || components != self.components
            || image_type != self.image_type
        {
            warn!(
                buffer = %self.name,
                expected = ?(self.frame_size, self.scalar_type, self.components, self.image_type),
                received = ?(output_size, scalar_type, components, image_type),
                "frame format and buffer frame format do not match"
            );
            return Err(EchoTrackError::FormatMismatch(format!(
                "cannot add frame: expected {:?} {} x{}, received {:?} {} x{}",
                self.frame_size,
                self.scalar_type.name(),
                self.components,
                output_size,
                scalar_type.name(),
                components
            )));
        }

        let expected_bytes = VideoFrame::byte_len(input_size, scalar_type, components);
        let pixels = pixels.get(skip_bytes..).ok_or_else(|| {
            EchoTrackError::InvalidParameter(format!(
                "skip offset {skip_bytes} exceeds the {} byte input buffer",
                pixels.len()
            ))
        })?;
        if pixels.len() < expected_bytes {
            return Err(EchoTrackError::FormatMismatch(format!(
                "input pixel buffer holds {} bytes, geometry requires {expected_bytes}",
                pixels.len()
            )));
        }

        let flip = orientation.flip_to(self.orientation);

        let mut ring = self.lock_ring();
        let (uid, index) = match ring.prepare_slot(filtered) {
            Ok(reserved) => reserved,
            Err(_) => {
                // Expected on retries with a stale timestamp, so only debug.
                debug!(
                    buffer = %self.name,
                    filtered,
                    "failed to prepare the buffer for a new frame"
                );
                return Ok(AppendOutcome::Dropped);
            }
        };

        let slot = ring.slot_mut(index);
        let frame = slot.frame.get_or_insert_with(VideoFrame::default);
        if frame.size != output_size
            || frame.scalar_type != scalar_type
            || frame.components != components
        {
            frame.allocate(output_size, scalar_type, components);
        }
        frame.orientation = self.orientation;
        frame.image_type = image_type;
        frame.copy_oriented_from(&pixels[..expected_bytes], input_size, flip, clip)?;

        slot.status = SampleStatus::Ok;
        slot.frame_index = frame_index;
        slot.unfiltered_time = unfiltered;
        if let Some(fields) = fields {
            for (name, value) in fields.iter() {
                slot.set_field(name, value);
            }
        }
        Ok(AppendOutcome::Added { uid })
    }

    /// Append an already-assembled frame.
    pub fn add_video_frame(
        &self,
        frame: &VideoFrame,
        frame_index: u64,
        clip: Option<ClipRect>,
        times: SampleTimes,
        fields: Option<&FieldMap>,
    ) -> Result<AppendOutcome> {
        self.add_frame(
            &frame.data,
            frame.orientation,
            frame.size,
            frame.scalar_type,
            frame.components,
            frame.image_type,
            0,
            frame_index,
            clip,
            times,
            fields,
        )
    }

    /// Append a pose matrix with a tool status.
    pub fn add_matrix(
        &self,
        matrix: DMat4,
        status: SampleStatus,
        frame_index: u64,
        times: SampleTimes,
        fields: Option<&FieldMap>,
    ) -> Result<AppendOutcome> {
        let Some((unfiltered, filtered)) = self.resolve_timestamps(frame_index, times) else {
            return Ok(AppendOutcome::Dropped);
        };

        let mut ring = self.lock_ring();
        let (uid, index) = match ring.prepare_slot(filtered) {
            Ok(reserved) => reserved,
            Err(_) => {
                debug!(
                    buffer = %self.name,
                    filtered,
                    "failed to prepare the buffer for a new pose"
                );
                return Ok(AppendOutcome::Dropped);
            }
        };

        let slot = ring.slot_mut(index);
        slot.frame = None;
        slot.set_matrix(matrix);
        slot.status = status;
        slot.frame_index = frame_index;
        slot.unfiltered_time = unfiltered;
        if let Some(fields) = fields {
            for (name, value) in fields.iter() {
                slot.set_field(name, value);
            }
        }
        Ok(AppendOutcome::Added { uid })
    }

    /// Append a field-only sample. An empty map succeeds as a no-op.
    pub fn add_fields(
        &self,
        fields: &FieldMap,
        frame_index: u64,
        times: SampleTimes,
    ) -> Result<AppendOutcome> {
        if fields.is_empty() {
            return Ok(AppendOutcome::Dropped);
        }
        let Some((unfiltered, filtered)) = self.resolve_timestamps(frame_index, times) else {
            return Ok(AppendOutcome::Dropped);
        };

        let mut ring = self.lock_ring();
        let (uid, index) = match ring.prepare_slot(filtered) {
            Ok(reserved) => reserved,
            Err(_) => {
                debug!(
                    buffer = %self.name,
                    filtered,
                    "failed to prepare the buffer for new fields"
                );
                return Ok(AppendOutcome::Dropped);
            }
        };

        let slot = ring.slot_mut(index);
        slot.frame = None;
        slot.status = SampleStatus::Ok;
        slot.frame_index = frame_index;
        slot.unfiltered_time = unfiltered;
        for (name, value) in fields.iter() {
            slot.set_field(name, value);
        }
        Ok(AppendOutcome::Added { uid })
    }

    // ── Query path ──────────────────────────────────────────────

    /// Deep copy of the sample with the given UID.
    pub fn item(&self, uid: u64) -> std::result::Result<StreamSample, RetrieveError> {
        self.lock_ring().get(uid).cloned()
    }

    /// Deep copies of every occupied sample in UID order, taken under a
    /// single lock acquisition so bulk exports see a consistent ring.
    pub fn items_snapshot(&self) -> Vec<StreamSample> {
        let ring = self.lock_ring();
        ring.uids().filter_map(|uid| ring.get(uid).ok().cloned()).collect()
    }

    /// Filtered timestamp of a sample, with the local time offset applied.
    pub fn timestamp(&self, uid: u64) -> std::result::Result<f64, RetrieveError> {
        self.lock_ring()
            .timestamp(uid)
            .map(|t| t + self.local_time_offset_sec)
    }

    /// Producer frame index of a sample.
    pub fn frame_index(&self, uid: u64) -> std::result::Result<u64, RetrieveError> {
        self.lock_ring().frame_index(uid)
    }

    /// Filtered timestamp of the newest sample, offset applied.
    pub fn latest_timestamp(&self) -> std::result::Result<f64, RetrieveError> {
        self.lock_ring()
            .latest_timestamp()
            .map(|t| t + self.local_time_offset_sec)
    }

    /// Filtered timestamp of the oldest sample, offset applied.
    pub fn oldest_timestamp(&self) -> std::result::Result<f64, RetrieveError> {
        self.lock_ring()
            .oldest_timestamp()
            .map(|t| t + self.local_time_offset_sec)
    }

    /// UID of the sample closest to the given (offset) time.
    pub fn uid_for_time(&self, time: f64) -> std::result::Result<u64, RetrieveError> {
        self.lock_ring()
            .uid_for_time(time - self.local_time_offset_sec)
    }

    /// Retrieve a sample by time under the chosen interpolation mode.
    pub fn item_from_time(
        &self,
        time: f64,
        mode: TemporalInterpolation,
    ) -> std::result::Result<StreamSample, RetrieveError> {
        match mode {
            TemporalInterpolation::Exact => self.item_from_exact_time(time),
            TemporalInterpolation::Closest => self.item_from_closest_time(time),
            TemporalInterpolation::Interpolated => self.item_from_interpolated_time(time),
        }
    }

    fn item_from_closest_time(&self, time: f64) -> std::result::Result<StreamSample, RetrieveError> {
        let local_time = time - self.local_time_offset_sec;
        let ring = self.lock_ring();
        let uid = ring.uid_for_time(local_time).inspect_err(|status| {
            warn!(buffer = %self.name, time, ?status, "cannot get any item for the requested time");
        })?;
        ring.get(uid).cloned()
    }

    fn item_from_exact_time(&self, time: f64) -> std::result::Result<StreamSample, RetrieveError> {
        let item = self.item_from_closest_time(time)?;
        let item_time = item.filtered_timestamp(self.local_time_offset_sec);
        if (item_time - time).abs() > NEGLIGIBLE_TIME_DIFFERENCE_SEC {
            warn!(
                buffer = %self.name,
                requested = time,
                item_time,
                "cannot find an item exactly at the requested time"
            );
            return Err(RetrieveError::UnknownError);
        }
        Ok(item)
    }

    fn item_from_interpolated_time(
        &self,
        time: f64,
    ) -> std::result::Result<StreamSample, RetrieveError> {
        let local_time = time - self.local_time_offset_sec;
        match self.prev_next_from_time(local_time) {
            Some((item_a, item_b)) => {
                if item_a.uid == item_b.uid
                    || (item_a.filtered_time - item_b.filtered_time).abs()
                        < NEGLIGIBLE_TIME_DIFFERENCE_SEC
                {
                    let mut out = item_a;
                    out.filtered_time = local_time;
                    out.unfiltered_time = local_time;
                    return Ok(out);
                }
                Ok(interpolate_between(&item_a, &item_b, local_time))
            }
            None => {
                // Cannot interpolate (tracker out of view, gap too large).
                // Fall back to the closest sample, stamped with the request
                // time and marked missing; this is not an error.
                let mut out = self.item_from_closest_time(time)?;
                out.filtered_time = local_time;
                out.unfiltered_time = local_time;
                out.status = SampleStatus::Missing;
                Ok(out)
            }
        }
    }

    /// The two samples straddling `local_time`: the closest one and its
    /// neighbour on the opposite side. `None` when interpolation between
    /// them would be meaningless.
    fn prev_next_from_time(&self, local_time: f64) -> Option<(StreamSample, StreamSample)> {
        let ring = self.lock_ring();
        let uid_a = match ring.uid_for_time(local_time) {
            Ok(uid) => uid,
            Err(status) => {
                debug!(
                    buffer = %self.name,
                    local_time,
                    ?status,
                    "cannot get any item for the requested time"
                );
                return None;
            }
        };
        let item_a = ring.get(uid_a).ok()?.clone();
        if item_a.status != SampleStatus::Ok {
            debug!(
                buffer = %self.name,
                uid = uid_a,
                "closest item to the requested time is invalid, interpolation skipped"
            );
            return None;
        }

        let time_a = item_a.filtered_time;
        if (time_a - local_time).abs() < NEGLIGIBLE_TIME_DIFFERENCE_SEC {
            return Some((item_a.clone(), item_a));
        }
        if (time_a - local_time).abs() > self.max_allowed_time_difference_sec {
            warn!(
                buffer = %self.name,
                local_time,
                item_time = time_a,
                "cannot interpolate, the closest item is too far from the requested time"
            );
            return None;
        }

        let uid_b = if local_time < time_a {
            uid_a.checked_sub(1)?
        } else {
            uid_a + 1
        };
        if uid_b < ring.oldest_uid() || uid_b > ring.latest_uid() {
            warn!(
                buffer = %self.name,
                uid_b,
                "cannot interpolate, the second item is not in the buffer"
            );
            return None;
        }
        let item_b = ring.get(uid_b).ok()?.clone();
        if (item_b.filtered_time - local_time).abs() > self.max_allowed_time_difference_sec {
            warn!(
                buffer = %self.name,
                local_time,
                item_time = item_b.filtered_time,
                "cannot interpolate, the second item is too far from the requested time"
            );
            return None;
        }
        // Refuse interpolation across a gap wider than the allowed
        // difference; linear weighting across such a span is meaningless.
        if (item_a.filtered_time - item_b.filtered_time).abs()
            > self.max_allowed_time_difference_sec
        {
            warn!(
                buffer = %self.name,
                gap = (item_a.filtered_time - item_b.filtered_time).abs(),
                "cannot interpolate, the neighbouring items are too far apart"
            );
            return None;
        }
        if item_b.status != SampleStatus::Ok {
            debug!(
                buffer = %self.name,
                uid = uid_b,
                "no valid item on the other side of the requested time"
            );
            return None;
        }
        Some((item_a, item_b))
    }
}

impl Default for DataBuffer {
    fn default() -> Self {
        Self::new(String::new())
    }
}
