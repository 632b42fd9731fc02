//! EchoTrack Buffer - The timestamped data buffer core.
//!
//! Multiple asynchronous producers (frame grabbers, pose trackers) append
//! timestamped samples; consumers retrieve them by unique identifier or by
//! time, optionally with temporal interpolation (SLERP for rotation, linear
//! for translation and time). The buffer smooths raw producer timestamps
//! with a sliding-window linear regression so that time-indexed queries see
//! a monotone clock even when the raw timestamps jitter.

pub mod buffer;
pub mod filter;
pub mod interpolate;
pub mod ring;
pub mod sample;

pub use buffer::{AppendOutcome, DataBuffer, SampleTimes, TemporalInterpolation};
pub use filter::{FilteredTimestamp, TimestampFilter, TimestampReportEntry};
pub use ring::{RetrieveError, TimestampedRing};
pub use sample::StreamSample;
