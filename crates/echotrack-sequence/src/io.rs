//! Sequence file reading and writing with versioning.
//!
//! Sequence files are JSON documents with a schema version field, optionally
//! gzip-compressed. Compression is detected on read from the gzip magic
//! bytes, so readers need no flag.

use crate::frame_list::TrackedFrameList;
use echotrack_core::{EchoTrackError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Versioned sequence file wrapper.
#[derive(Debug, Serialize, Deserialize)]
struct SequenceFile {
    version: u32,
    list: TrackedFrameList,
}

/// Write a sequence file.
///
/// With `include_image_data` false only the frame metadata is written; the
/// pixel payloads are omitted (the REMOVE_IMAGE_DATA operation).
pub fn write_sequence(
    path: &Path,
    list: &TrackedFrameList,
    use_compression: bool,
    include_image_data: bool,
) -> Result<()> {
    let document = SequenceFile {
        version: CURRENT_VERSION,
        list: if include_image_data {
            list.clone()
        } else {
            let mut stripped = list.clone();
            for frame in stripped.iter_mut() {
                frame.frame = None;
            }
            stripped
        },
    };

    let json = serde_json::to_vec_pretty(&document)
        .map_err(|e| EchoTrackError::Serialization(format!("failed to serialize sequence: {e}")))?;

    let bytes = if use_compression {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        encoder
            .finish()
            .map_err(|e| EchoTrackError::Serialization(format!("gzip compression failed: {e}")))?
    } else {
        json
    };

    std::fs::write(path, bytes)?;
    info!(
        path = %path.display(),
        frames = list.len(),
        compressed = use_compression,
        "sequence file written"
    );
    Ok(())
}

/// Read a sequence file, transparently decompressing gzip input.
pub fn read_sequence(path: &Path) -> Result<TrackedFrameList> {
    let raw = std::fs::read(path)?;

    let json = if raw.len() >= 2 && raw[..2] == GZIP_MAGIC {
        let mut decoder = GzDecoder::new(raw.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        decompressed
    } else {
        raw
    };

    let document: SequenceFile = serde_json::from_slice(&json).map_err(|e| {
        EchoTrackError::Serialization(format!(
            "invalid sequence file '{}': {e}",
            path.display()
        ))
    })?;

    if document.version > CURRENT_VERSION {
        return Err(EchoTrackError::Serialization(format!(
            "sequence file version {} is newer than supported version {CURRENT_VERSION}",
            document.version
        )));
    }

    Ok(document.list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_list::TrackedFrame;
    use echotrack_core::{ScalarType, VideoFrame};

    fn sample_list() -> TrackedFrameList {
        let mut list = TrackedFrameList::new();
        let mut frame = TrackedFrame::new();
        frame.set_timestamp(1.5);
        frame.frame = Some(VideoFrame::new([2, 2, 1], ScalarType::U8, 1));
        list.push(frame);
        list.fields.set("UltrasoundImageOrientation", "MF");
        list
    }

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sequence.json");
        let list = sample_list();

        write_sequence(&path, &list, false, true).unwrap();
        let loaded = read_sequence(&path).unwrap();
        assert_eq!(loaded, list);
    }

    #[test]
    fn test_compressed_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sequence.json.gz");
        let list = sample_list();

        write_sequence(&path, &list, true, true).unwrap();
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &GZIP_MAGIC);

        let loaded = read_sequence(&path).unwrap();
        assert_eq!(loaded, list);
    }

    #[test]
    fn test_metadata_only_write_strips_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let list = sample_list();

        write_sequence(&path, &list, false, false).unwrap();
        let loaded = read_sequence(&path).unwrap();
        assert!(loaded.get(0).unwrap().frame.is_none());
        assert_eq!(loaded.get(0).unwrap().timestamp(), Some(1.5));
    }

    #[test]
    fn test_future_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.json");
        std::fs::write(
            &path,
            serde_json::json!({"version": 999, "list": {"frames": [], "fields": {}}})
                .to_string(),
        )
        .unwrap();
        assert!(read_sequence(&path).is_err());
    }
}
