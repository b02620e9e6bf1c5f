//! Describes the asynchronous block-transfer machinery.
//!
//! A pipeline rank works on small local buffers while data moves between
//! those buffers and bulk storage (the full array-of-arrays) in the
//! background. Transfers are tracked with a small set of tags: tag `r`
//! (for `r < n_array`) tracks the inbound transfers of array `r` and tag
//! `n_array` tracks the outbound transfers of the reduced output.
//!
//! # Buffer ownership
//! A local buffer is handed to the engine when a transfer begins and is only
//! handed back by [`TransferEngine::wait`]. Consequently, it is impossible
//! to refill or reuse a buffer while a transfer involving it is still in
//! flight. Combined with [`TagSlots`], which permits at most one outstanding
//! transfer per tag, this gives the "one outstanding write per buffer slot"
//! discipline the reducer relies upon.

use crate::pack::RankStorage;
use crate::record::AccumulatorRecord;
use core::fmt;
use core::ops::Range;

/// The maximum number of arrays that can be reduced at once. Each array
/// needs a dedicated transfer tag.
pub const MAX_ARRAY: usize = 11;

/// The number of transfer tags (one per input array and one for output)
pub const MAX_TAGS: usize = MAX_ARRAY + 1;

/// Identifies a stream of transfers whose completion is tracked together
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tag(u8);

impl Tag {
    /// The tag used for inbound transfers of `array`
    ///
    /// # Panics
    /// Panics if `array >= MAX_ARRAY`
    pub const fn input(array: usize) -> Self {
        assert!(array < MAX_ARRAY);
        Tag(array as u8)
    }

    /// The tag used for outbound transfers when reducing `n_array` arrays
    ///
    /// # Panics
    /// Panics if `n_array > MAX_ARRAY`
    pub const fn output(n_array: usize) -> Self {
        assert!(n_array <= MAX_ARRAY);
        Tag(n_array as u8)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tag {}", self.0)
    }
}

/// Errors raised by the transfer machinery.
///
/// None of these are recoverable within a reduction. They indicate either a
/// malformed request (the caller's ranges weren't properly validated) or a
/// failure of the underlying transfer fabric.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferError {
    /// the requested records lie outside of the rank's owned range
    OutOfRange {
        requested: Range<usize>,
        owned: Range<usize>,
    },
    /// the requested length is zero or exceeds the local buffer
    Misaligned { len: usize, capacity: usize },
    /// the array index doesn't refer to one of the arrays being reduced
    UnknownArray(usize),
    /// a transfer was issued on a tag that already has one in flight
    TagBusy(Tag),
    /// a wait was issued on a tag that was expected to have a transfer in
    /// flight, but didn't
    NotPending(Tag),
    /// a wait exceeded the configured timeout
    TimedOut(Tag),
    /// the entity performing transfers went away
    Disconnected(Tag),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransferError::OutOfRange { requested, owned } => write!(
                f,
                "records {}..{} lie outside of the owned range {}..{}",
                requested.start, requested.end, owned.start, owned.end
            ),
            TransferError::Misaligned { len, capacity } => write!(
                f,
                "a transfer of {len} records doesn't fit a local buffer with \
                 room for {capacity} records"
            ),
            TransferError::UnknownArray(array) => write!(f, "array {array} isn't being reduced"),
            TransferError::TagBusy(tag) => write!(f, "{tag} already has a transfer in flight"),
            TransferError::NotPending(tag) => write!(f, "{tag} has no transfer in flight"),
            TransferError::TimedOut(tag) => write!(f, "timed out while waiting on {tag}"),
            TransferError::Disconnected(tag) => {
                write!(f, "transfer engine disconnected while serving {tag}")
            }
        }
    }
}

/// A fixed set of slots, one per tag, each holding the handle of at most one
/// in-flight transfer.
pub struct TagSlots<H> {
    slots: [Option<H>; MAX_TAGS],
}

impl<H> Default for TagSlots<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> TagSlots<H> {
    pub fn new() -> Self {
        TagSlots {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// record `handle` as the in-flight transfer for `tag`
    pub fn issue(&mut self, tag: Tag, handle: H) -> Result<(), TransferError> {
        let slot = &mut self.slots[tag.index()];
        if slot.is_some() {
            Err(TransferError::TagBusy(tag))
        } else {
            *slot = Some(handle);
            Ok(())
        }
    }

    /// remove and return the in-flight handle for `tag` (if any)
    pub fn take(&mut self, tag: Tag) -> Option<H> {
        self.slots[tag.index()].take()
    }

    pub fn is_pending(&self, tag: Tag) -> bool {
        self.slots[tag.index()].is_some()
    }

    pub fn n_pending(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// the tags that currently have a transfer in flight (in increasing order)
    pub fn pending_tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| Tag(i as u8))
    }
}

/// Describes a facility that moves blocks of records between bulk storage
/// and local buffers.
///
/// The `'s` lifetime is the lifetime of the local (scratch) buffers.
///
/// Implementations must ensure that `begin_get` and `begin_put` return
/// without waiting for the transfer to complete. Only `wait` and `finish`
/// may block.
pub trait TransferEngine<'s> {
    /// Start copying `records` (global record indices) of `array` into `dst`.
    ///
    /// The first `records.len()` entries of `dst` are overwritten. `dst` is
    /// returned by the call to [`wait`](Self::wait) on `tag`.
    fn begin_get(
        &mut self,
        tag: Tag,
        array: usize,
        records: Range<usize>,
        dst: &'s mut [AccumulatorRecord],
    ) -> Result<(), TransferError>;

    /// Start copying the first `records.len()` entries of `src` to the
    /// output storage at `records` (global record indices).
    fn begin_put(
        &mut self,
        tag: Tag,
        records: Range<usize>,
        src: &'s mut [AccumulatorRecord],
    ) -> Result<(), TransferError>;

    /// Block until the transfer in flight on `tag` completes, then return
    /// its local buffer. Returns `Ok(None)` when nothing is in flight.
    fn wait(&mut self, tag: Tag) -> Result<Option<&'s mut [AccumulatorRecord]>, TransferError>;

    /// Block until every transfer in flight completes.
    fn finish(&mut self) -> Result<(), TransferError>;
}

/// A transfer engine that completes every transfer synchronously, inside of
/// the call that begins it.
///
/// This is primarily useful for testing and for running on hardware without
/// a separate transfer engine. Results are identical to any asynchronous
/// engine since the reducer never depends on transfer timing.
pub struct ImmediateTransfer<'g, 's> {
    storage: RankStorage<'g>,
    slots: TagSlots<&'s mut [AccumulatorRecord]>,
}

impl<'g, 's> ImmediateTransfer<'g, 's> {
    pub fn new(storage: RankStorage<'g>) -> Self {
        ImmediateTransfer {
            storage,
            slots: TagSlots::new(),
        }
    }

    pub fn n_pending(&self) -> usize {
        self.slots.n_pending()
    }
}

impl<'g, 's> TransferEngine<'s> for ImmediateTransfer<'g, 's> {
    fn begin_get(
        &mut self,
        tag: Tag,
        array: usize,
        records: Range<usize>,
        dst: &'s mut [AccumulatorRecord],
    ) -> Result<(), TransferError> {
        if self.slots.is_pending(tag) {
            return Err(TransferError::TagBusy(tag));
        }
        self.storage.read_into(array, records, dst)?;
        self.slots.issue(tag, dst)
    }

    fn begin_put(
        &mut self,
        tag: Tag,
        records: Range<usize>,
        src: &'s mut [AccumulatorRecord],
    ) -> Result<(), TransferError> {
        if self.slots.is_pending(tag) {
            return Err(TransferError::TagBusy(tag));
        }
        self.storage.write_from(records, src)?;
        self.slots.issue(tag, src)
    }

    fn wait(&mut self, tag: Tag) -> Result<Option<&'s mut [AccumulatorRecord]>, TransferError> {
        Ok(self.slots.take(tag))
    }

    fn finish(&mut self) -> Result<(), TransferError> {
        for i in 0..MAX_TAGS {
            self.slots.take(Tag(i as u8));
        }
        Ok(())
    }
}
