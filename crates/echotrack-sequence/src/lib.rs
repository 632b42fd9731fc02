//! EchoTrack Sequence - Tracked frame lists and sequence files.
//!
//! The ordered frame list is the flat form samples take outside the buffer:
//! what device-independent codecs read and write, and what the edit
//! operations transform. The bridge moves whole lists in and out of the
//! time-indexed buffer under the three timestamp-handling modes.

pub mod bridge;
pub mod frame_list;
pub mod io;

pub use bridge::{
    copy_frames_to_buffer, copy_transform_to_buffer, export_buffer, TimestampMode,
};
pub use frame_list::{TrackedFrame, TrackedFrameList, DEFAULT_TIMESTAMP_DIGITS};
pub use io::{read_sequence, write_sequence};
