//! EchoTrack Edit - Batch operations over tracked frame sequences.
//!
//! Trimming, decimation, field edits, derived transforms, image fill/crop,
//! and reference re-parenting, all as pure in-place transforms over a
//! [`echotrack_sequence::TrackedFrameList`].

pub mod ops;
pub mod repository;

pub use ops::{
    add_transforms, crop_rectangle, decimate, delete_field, delete_frame_field, fill_rectangle,
    trim, update_field_name, update_field_value, update_frame_field, update_reference_transform,
    FrameFieldUpdate, FIELD_VALUE_FRAME_SCALAR, FIELD_VALUE_FRAME_TRANSFORM,
};
pub use repository::{ConfiguredTransform, RepositoryConfig, TransformRepository};
