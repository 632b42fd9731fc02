//! Integration tests for the edit operations over sequence files.
//!
//! Each test runs an operation the way the editor tool does: read or build
//! a list, transform it, write it out, and verify the reloaded result.

use echotrack_core::fields::FIELD_FRAME_NUMBER;
use echotrack_core::{FieldStatus, FlipInfo, ScalarType, TransformName, VideoFrame};
use echotrack_edit::{FrameFieldUpdate, FIELD_VALUE_FRAME_SCALAR};
use echotrack_sequence::{read_sequence, write_sequence, TrackedFrame, TrackedFrameList};
use glam::{DMat4, DVec3};

// ── Helpers ────────────────────────────────────────────────────

fn numbered_list(count: usize) -> TrackedFrameList {
    let mut list = TrackedFrameList::new();
    for i in 0..count {
        let mut frame = TrackedFrame::new();
        frame.set_timestamp(i as f64 * 0.1);
        frame.fields.set(FIELD_FRAME_NUMBER, i.to_string());
        list.push(frame);
    }
    list
}

fn frame_numbers(list: &TrackedFrameList) -> Vec<u64> {
    list.iter().filter_map(TrackedFrame::frame_number).collect()
}

// ── Trim and decimate laws ─────────────────────────────────────

#[test]
fn trim_full_range_is_identity() {
    let mut list = numbered_list(8);
    let before = frame_numbers(&list);
    echotrack_edit::trim(&mut list, 0, 7).unwrap();
    assert_eq!(frame_numbers(&list), before);
}

#[test]
fn decimate_composes_multiplicatively() {
    let mut composed = numbered_list(24);
    echotrack_edit::decimate(&mut composed, 2).unwrap();
    echotrack_edit::decimate(&mut composed, 4).unwrap();

    let mut direct = numbered_list(24);
    echotrack_edit::decimate(&mut direct, 8).unwrap();

    assert_eq!(frame_numbers(&composed), frame_numbers(&direct));
}

// ── Scenario: frame-scalar sentinel through a file round-trip ──

#[test]
fn frame_scalar_sentinel_writes_formatted_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scalars.json");

    let mut list = numbered_list(4);
    let update = FrameFieldUpdate {
        field_name: "ElevationAngleDeg".into(),
        updated_field_value: FIELD_VALUE_FRAME_SCALAR.into(),
        frame_scalar_start: 1.0,
        frame_scalar_increment: 0.5,
        frame_scalar_decimal_digits: 3,
        ..Default::default()
    };
    echotrack_edit::update_frame_field(&mut list, &update).unwrap();
    write_sequence(&path, &list, false, true).unwrap();

    let loaded = read_sequence(&path).unwrap();
    let values: Vec<&str> = loaded
        .iter()
        .map(|frame| frame.fields.get("ElevationAngleDeg").unwrap())
        .collect();
    assert_eq!(values, vec!["1.000", "1.500", "2.000", "2.500"]);
}

// ── Scenario: fill rectangle pixel accounting ──────────────────

#[test]
fn fill_rectangle_touches_exactly_the_rectangle() {
    let mut list = TrackedFrameList::new();
    let mut frame = TrackedFrame::new();
    frame.frame = Some(VideoFrame::new([10, 10, 1], ScalarType::U8, 1));
    list.push(frame);

    echotrack_edit::fill_rectangle(&mut list, [2, 3], [4, 5], 128).unwrap();

    let image = list.get(0).unwrap().frame.as_ref().unwrap();
    for y in 0..10u32 {
        for x in 0..10u32 {
            let value = image.data[(y * 10 + x) as usize];
            let inside = (2..6).contains(&x) && (3..8).contains(&y);
            assert_eq!(value, if inside { 128 } else { 0 }, "pixel ({x}, {y})");
        }
    }
}

// ── Crop attaches the image offset transform ───────────────────

#[test]
fn crop_records_image_to_cropped_image_offset() {
    let mut list = TrackedFrameList::new();
    let mut frame = TrackedFrame::new();
    frame.frame = Some(VideoFrame::new([16, 16, 1], ScalarType::U8, 1));
    list.push(frame);

    echotrack_edit::crop_rectangle(&mut list, [4, 2, 0], [8, 8, 1], FlipInfo::NONE).unwrap();

    let frame = list.get(0).unwrap();
    assert_eq!(frame.frame.as_ref().unwrap().size, [8, 8, 1]);
    let name = TransformName::new("Image", "CroppedImage");
    let matrix = frame.transform(&name).unwrap();
    assert_eq!(matrix.w_axis.truncate(), DVec3::new(-4.0, -2.0, 0.0));
    assert_eq!(frame.transform_status(&name), FieldStatus::Ok);
}

// ── Law: reference-transform update ────────────────────────────

#[test]
fn reference_update_rewrites_all_reference_children() {
    let reference = TransformName::new("Reference", "Tracker");
    let probe = TransformName::new("Probe", "Reference");
    let stylus = TransformName::new("Stylus", "Reference");

    let reference_matrix = DMat4::from_rotation_z(0.3)
        * DMat4::from_translation(DVec3::new(0.0, 10.0, 0.0));
    let probe_matrix = DMat4::from_translation(DVec3::new(1.0, 2.0, 3.0));
    let stylus_matrix = DMat4::from_rotation_x(0.1);

    let mut list = numbered_list(2);
    for i in 0..2 {
        let frame = list.get_mut(i).unwrap();
        frame.set_transform(&reference, &reference_matrix);
        frame.set_transform(&probe, &probe_matrix);
        frame.set_transform_status(&probe, FieldStatus::Ok);
        frame.set_transform(&stylus, &stylus_matrix);
        frame.set_transform_status(&stylus, FieldStatus::Invalid);
    }

    echotrack_edit::update_reference_transform(&mut list, &reference).unwrap();

    for i in 0..2 {
        let frame = list.get(i).unwrap();

        for (old, matrix, status) in [
            (&probe, probe_matrix, FieldStatus::Ok),
            (&stylus, stylus_matrix, FieldStatus::Invalid),
        ] {
            // the old transform and its status are gone
            assert!(frame.fields.get(&old.field_name()).is_none());
            assert!(frame.fields.get(&old.status_field_name()).is_none());

            // the re-parented transform matches R * (X -> Reference)
            let new_name = TransformName::new(old.from.clone(), "Tracker");
            let rewritten = frame.transform(&new_name).unwrap();
            let expected = reference_matrix * matrix;
            let frobenius: f64 = (rewritten - expected)
                .abs()
                .to_cols_array()
                .iter()
                .map(|v| v * v)
                .sum::<f64>()
                .sqrt();
            assert!(frobenius < 1e-9);
            assert_eq!(frame.transform_status(&new_name), status);
        }

        // the reference transform itself is untouched
        assert!(frame.fields.get(&reference.field_name()).is_some());
    }
}
