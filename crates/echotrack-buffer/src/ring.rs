//! Fixed-capacity circular storage of timestamped samples.
//!
//! The ring hands out monotone UIDs and keeps samples ordered by filtered
//! time. It carries no lock of its own; `DataBuffer` wraps it in a mutex and
//! every mutation or multi-item read runs under that scoped guard.

use crate::sample::StreamSample;
use echotrack_core::{EchoTrackError, Result, NEGLIGIBLE_TIME_DIFFERENCE_SEC};
use thiserror::Error;

/// Default ring capacity: keeps the last 5 seconds of data at 30 fps
/// (2.5 seconds at 60 fps) without consuming excessive memory.
pub const DEFAULT_RING_CAPACITY: usize = 150;

/// Why a sample could not be retrieved.
///
/// These are statuses rather than faults: a consumer asking for a UID that
/// was already overwritten, or a time the producer has not reached yet, is
/// normal operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveError {
    /// The UID (or time) is newer than anything appended so far.
    #[error("item is not available yet")]
    NotAvailableYet,
    /// The UID (or time) was overwritten by newer samples.
    #[error("item is not available anymore")]
    NotAvailableAnymore,
    /// The ring holds no items.
    #[error("the buffer is empty")]
    Empty,
    /// The request could not be satisfied for another reason.
    #[error("unknown retrieval error")]
    UnknownError,
}

/// Circular store of [`StreamSample`]s with monotone UID assignment.
#[derive(Debug, Clone)]
pub struct TimestampedRing {
    items: Vec<StreamSample>,
    /// Next slot to overwrite.
    write_pos: usize,
    /// Occupied slot count, at most `items.len()`.
    num_items: usize,
    /// UID assigned to the next successful append; starts at 0.
    next_uid: u64,
    /// UID of the newest occupied slot; meaningless while the ring is empty.
    latest_uid: u64,
}

impl TimestampedRing {
    /// Create a ring with the given capacity. A zero capacity is a
    /// programming error and aborts construction.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be at least 1");
        Self {
            items: vec![StreamSample::default(); capacity],
            write_pos: 0,
            num_items: 0,
            next_uid: 0,
            latest_uid: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    /// UID of the newest occupied slot.
    pub fn latest_uid(&self) -> u64 {
        self.latest_uid
    }

    /// UID of the oldest occupied slot.
    pub fn oldest_uid(&self) -> u64 {
        if self.num_items == 0 {
            0
        } else {
            self.latest_uid + 1 - self.num_items as u64
        }
    }

    /// Occupied UIDs in append order. Empty when the ring is empty.
    pub fn uids(&self) -> std::ops::RangeInclusive<u64> {
        if self.num_items == 0 {
            1..=0
        } else {
            self.oldest_uid()..=self.latest_uid
        }
    }

    fn slot_of_uid(&self, uid: u64) -> usize {
        let cap = self.items.len();
        let back = (self.latest_uid - uid) as usize;
        (self.write_pos + cap - 1 - back) % cap
    }

    /// Reserve the next slot for a sample with the given filtered time.
    ///
    /// Fails when the time is not strictly greater than the latest filtered
    /// time by more than the negligible-time-difference threshold. On
    /// success the slot is reset (pixel allocation kept), the UID assigned,
    /// and the write position advanced.
    pub fn prepare_slot(&mut self, filtered_time: f64) -> Result<(u64, usize)> {
        if self.num_items > 0 {
            let latest_time = self.items[self.slot_of_uid(self.latest_uid)].filtered_time;
            if filtered_time - latest_time < NEGLIGIBLE_TIME_DIFFERENCE_SEC {
                return Err(EchoTrackError::InvalidTimestamp(format!(
                    "new timestamp {filtered_time:.6} is not newer than the latest \
                     timestamp {latest_time:.6} in the buffer"
                )));
            }
        }

        let uid = self.next_uid;
        self.next_uid += 1;
        let index = self.write_pos;
        self.write_pos = (self.write_pos + 1) % self.items.len();
        if self.num_items < self.items.len() {
            self.num_items += 1;
        }
        self.latest_uid = uid;

        let slot = &mut self.items[index];
        slot.reset_for_reuse();
        slot.uid = uid;
        slot.filtered_time = filtered_time;
        Ok((uid, index))
    }

    /// Borrow a slot by the index returned from [`TimestampedRing::prepare_slot`].
    pub fn slot_mut(&mut self, index: usize) -> &mut StreamSample {
        &mut self.items[index]
    }

    /// Borrow every slot, occupied or not, for bulk reconfiguration
    /// (pixel pre-allocation, orientation retagging).
    pub fn slots_mut(&mut self) -> impl Iterator<Item = &mut StreamSample> {
        self.items.iter_mut()
    }

    /// Borrow the sample with the given UID.
    pub fn get(&self, uid: u64) -> std::result::Result<&StreamSample, RetrieveError> {
        if self.num_items == 0 {
            return Err(RetrieveError::Empty);
        }
        if uid > self.latest_uid {
            return Err(RetrieveError::NotAvailableYet);
        }
        if uid < self.oldest_uid() {
            return Err(RetrieveError::NotAvailableAnymore);
        }
        Ok(&self.items[self.slot_of_uid(uid)])
    }

    /// Filtered time of the sample with the given UID.
    pub fn timestamp(&self, uid: u64) -> std::result::Result<f64, RetrieveError> {
        self.get(uid).map(|item| item.filtered_time)
    }

    /// Producer frame index of the sample with the given UID.
    pub fn frame_index(&self, uid: u64) -> std::result::Result<u64, RetrieveError> {
        self.get(uid).map(|item| item.frame_index)
    }

    /// Filtered time of the newest sample.
    pub fn latest_timestamp(&self) -> std::result::Result<f64, RetrieveError> {
        self.timestamp(self.latest_uid())
    }

    /// Filtered time of the oldest sample.
    pub fn oldest_timestamp(&self) -> std::result::Result<f64, RetrieveError> {
        self.timestamp(self.oldest_uid())
    }

    /// UID of the sample whose filtered time is closest to `time`.
    ///
    /// A time older than the oldest sample reports `NotAvailableAnymore`, a
    /// time newer than the latest `NotAvailableYet`. Inside the span a
    /// bisection over the time-ordered slice picks the closest sample, ties
    /// broken toward the earlier UID.
    pub fn uid_for_time(&self, time: f64) -> std::result::Result<u64, RetrieveError> {
        if self.num_items == 0 {
            return Err(RetrieveError::Empty);
        }
        let oldest = self.oldest_uid();
        let latest = self.latest_uid;
        if time < self.timestamp(oldest)? {
            return Err(RetrieveError::NotAvailableAnymore);
        }
        if time > self.timestamp(latest)? {
            return Err(RetrieveError::NotAvailableYet);
        }

        let mut lo = oldest;
        let mut hi = latest;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.timestamp(mid)? <= time {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let lo_diff = (time - self.timestamp(lo)?).abs();
        let hi_diff = (self.timestamp(hi)? - time).abs();
        Ok(if lo_diff <= hi_diff { lo } else { hi })
    }

    /// Drop all items. UID assignment continues monotonically; UIDs are
    /// never reused for the lifetime of the ring.
    pub fn clear(&mut self) {
        self.num_items = 0;
        self.write_pos = 0;
    }

    /// Change the capacity, discarding current contents.
    ///
    /// On allocation failure the ring is left at its previous capacity.
    pub fn resize(&mut self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(EchoTrackError::InvalidParameter(
                "ring capacity must be at least 1".into(),
            ));
        }
        if capacity > self.items.len() {
            let additional = capacity - self.items.len();
            self.items.try_reserve_exact(additional).map_err(|e| {
                EchoTrackError::Internal(format!("failed to allocate ring storage: {e}"))
            })?;
            self.items.resize_with(capacity, StreamSample::default);
        } else {
            self.items.truncate(capacity);
        }
        self.write_pos = 0;
        self.num_items = 0;
        Ok(())
    }

    /// Replace this ring's contents with a deep copy of another ring.
    pub fn deep_copy(&mut self, other: &Self) {
        self.clone_from(other);
    }
}

impl Default for TimestampedRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}
