//! Status tags for samples and transform fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Validity tag of one acquired sample.
///
/// Anything other than `Ok` means the payload should not be trusted for
/// spatial computations, but the sample still occupies its ring slot so
/// that the timeline stays contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleStatus {
    /// Payload is valid.
    #[default]
    Ok,
    /// The producer reported no data for this slot.
    Missing,
    /// A tracked tool left the tracker's measurement volume.
    OutOfView,
    /// The producer did not answer within its deadline.
    TimedOut,
    /// The payload failed validation.
    Invalid,
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Missing => "MISSING",
            Self::OutOfView => "OUT_OF_VIEW",
            Self::TimedOut => "REQ_TIMEOUT",
            Self::Invalid => "INVALID",
        };
        f.write_str(s)
    }
}

/// Validity of a transform field in a sequence frame.
///
/// Written next to each transform as `<From>To<To>TransformStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldStatus {
    #[default]
    Ok,
    Invalid,
}

impl FieldStatus {
    /// String form used in sequence files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Invalid => "INVALID",
        }
    }

    /// Parse the sequence-file string form. Unknown values map to `Invalid`.
    pub fn from_field_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("OK") {
            Self::Ok
        } else {
            Self::Invalid
        }
    }
}

impl From<SampleStatus> for FieldStatus {
    fn from(status: SampleStatus) -> Self {
        match status {
            SampleStatus::Ok => Self::Ok,
            _ => Self::Invalid,
        }
    }
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
