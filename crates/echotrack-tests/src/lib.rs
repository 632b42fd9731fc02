//! Integration test crate for EchoTrack.
//!
//! This crate exists solely to hold cross-crate integration tests. It
//! depends on the buffer, sequence, and edit crates to verify they work
//! together.

#[cfg(test)]
mod buffer;

#[cfg(test)]
mod edit;

#[cfg(test)]
mod sequence;
