//! Integration tests for the sequence bridge and file codec.

use echotrack_buffer::DataBuffer;
use echotrack_core::fields::{FIELD_FRAME_NUMBER, FIELD_UNFILTERED_TIMESTAMP};
use echotrack_core::{ScalarType, TransformName, VideoFrame};
use echotrack_sequence::{
    copy_frames_to_buffer, export_buffer, read_sequence, write_sequence, TimestampMode,
    TrackedFrame, TrackedFrameList,
};
use glam::{DMat4, DVec3};

// ── Helpers ────────────────────────────────────────────────────

fn three_frame_list() -> TrackedFrameList {
    let mut list = TrackedFrameList::new();
    for i in 0..3u64 {
        let mut frame = TrackedFrame::new();
        let mut image = VideoFrame::new([6, 4, 1], ScalarType::U8, 1);
        image.data.iter_mut().for_each(|v| *v = i as u8 * 10);
        frame.frame = Some(image);
        frame.set_timestamp(10.0 + i as f64 * 0.1);
        frame.fields.set(
            FIELD_UNFILTERED_TIMESTAMP,
            format!("{:.6}", 10.0 + i as f64 * 0.1),
        );
        frame.fields.set(FIELD_FRAME_NUMBER, i.to_string());
        frame.set_transform(
            &TransformName::new("Tool", "Tracker"),
            &DMat4::from_translation(DVec3::new(i as f64, 0.0, 0.0)),
        );
        list.push(frame);
    }
    list
}

// ── Scenario: import then export reproduces the reserved fields ─

#[test]
fn import_export_reproduces_reserved_fields() {
    let source = three_frame_list();
    let mut buffer = DataBuffer::new("bridge");
    copy_frames_to_buffer(
        &source,
        &mut buffer,
        TimestampMode::ReadFilteredAndUnfiltered,
        true,
    )
    .unwrap();

    let exported = export_buffer(&buffer, 6);
    assert_eq!(exported.len(), 3);
    for i in 0..3 {
        let input = source.get(i).unwrap();
        let output = exported.get(i).unwrap();
        assert_eq!(output.timestamp(), input.timestamp());
        assert_eq!(output.unfiltered_timestamp(), input.unfiltered_timestamp());
        assert_eq!(
            output.fields.get(FIELD_FRAME_NUMBER),
            input.fields.get(FIELD_FRAME_NUMBER)
        );
    }
}

// ── Law: export/import idempotence ─────────────────────────────

#[test]
fn export_import_idempotence() {
    let source = three_frame_list();
    let mut buffer = DataBuffer::new("first-pass");
    copy_frames_to_buffer(
        &source,
        &mut buffer,
        TimestampMode::ReadFilteredAndUnfiltered,
        true,
    )
    .unwrap();
    let first_export = export_buffer(&buffer, 6);

    let mut second_buffer = DataBuffer::new("second-pass");
    copy_frames_to_buffer(
        &first_export,
        &mut second_buffer,
        TimestampMode::ReadFilteredAndUnfiltered,
        true,
    )
    .unwrap();
    let second_export = export_buffer(&second_buffer, 6);

    // the second pass reproduces timestamps, indices, matrices, fields, and
    // pixels exactly
    assert_eq!(first_export, second_export);
}

// ── File round-trips ───────────────────────────────────────────

#[test]
fn file_round_trip_preserves_the_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.seq.json");
    let list = three_frame_list();

    write_sequence(&path, &list, false, true).unwrap();
    let loaded = read_sequence(&path).unwrap();
    assert_eq!(loaded, list);
}

#[test]
fn compressed_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.seq.json.gz");
    let list = three_frame_list();

    write_sequence(&path, &list, true, true).unwrap();
    let loaded = read_sequence(&path).unwrap();
    assert_eq!(loaded, list);

    // the compressed form is smaller for these repetitive pixels
    let compressed = std::fs::metadata(&path).unwrap().len();
    let plain_path = dir.path().join("scan-plain.json");
    write_sequence(&plain_path, &list, false, true).unwrap();
    let plain = std::fs::metadata(&plain_path).unwrap().len();
    assert!(compressed < plain);
}

#[test]
fn metadata_only_write_drops_pixels_but_keeps_tracking() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracking-only.json");
    let list = three_frame_list();

    write_sequence(&path, &list, false, false).unwrap();
    let loaded = read_sequence(&path).unwrap();

    for i in 0..3 {
        let frame = loaded.get(i).unwrap();
        assert!(frame.frame.is_none());
        assert!(frame
            .transform(&TransformName::new("Tool", "Tracker"))
            .is_ok());
        assert!(frame.timestamp().is_some());
    }
}

// ── Recomputed timestamps ──────────────────────────────────────

#[test]
fn unfiltered_compute_filtered_mode_rederives_timestamps() {
    let source = three_frame_list();
    let mut buffer = DataBuffer::new("refilter");
    copy_frames_to_buffer(
        &source,
        &mut buffer,
        TimestampMode::ReadUnfilteredComputeFiltered,
        false,
    )
    .unwrap();

    // all three frames were accepted and their filtered times are monotone
    assert_eq!(buffer.num_items(), 3);
    let mut previous = f64::NEG_INFINITY;
    for uid in buffer.oldest_uid()..=buffer.latest_uid() {
        let t = buffer.item(uid).unwrap().filtered_time;
        assert!(t > previous);
        previous = t;
    }
}
