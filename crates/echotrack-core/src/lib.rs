//! EchoTrack Core - Foundation types for tracked image acquisition
//!
//! This crate provides the fundamental types used throughout EchoTrack:
//! - Pixel frames and formats (VideoFrame, ScalarType, ImageOrientation)
//! - Coordinate transforms (TransformName, 4x4 matrix helpers)
//! - String field maps exchanged with sequence files
//! - Sample and field status tags
//! - Clock helpers for timestamping acquisition

pub mod clock;
pub mod error;
pub mod fields;
pub mod frame;
pub mod status;
pub mod transform;

pub use error::{EchoTrackError, Result};
pub use fields::FieldMap;
pub use frame::{ClipRect, FlipInfo, ImageOrientation, ImageType, ScalarType, VideoFrame};
pub use status::{FieldStatus, SampleStatus};
pub use transform::TransformName;

/// Two timestamps closer than this are treated as identical (10 microseconds).
pub const NEGLIGIBLE_TIME_DIFFERENCE_SEC: f64 = 1e-5;
