//! The per-rank block reducer.
//!
//! A rank streams through its owned range one block at a time. For each
//! block, array 0 seeds a double precision running sum, arrays `1..n_array`
//! are added to it in increasing index order, and the sum is rounded back to
//! single precision and written over array 0.
//!
//! The reducer keeps three kinds of work overlapped:
//! - inbound transfers of block `i+1` (each array's buffer is refilled as
//!   soon as its block `i` contents have been consumed)
//! - the arithmetic for block `i`
//! - the outbound transfer of block `i-1` (we only wait on it right before
//!   the output buffer is reused)

use crate::block::{accumulate_block, demote_block, promote_block};
use crate::partition::block_ranges;
use crate::record::{AccumulatorRecord, WideRecord};
use crate::transfer::{MAX_ARRAY, Tag, TransferEngine, TransferError};
use core::ops::Range;

/// The block length used unless a caller asks for something else
pub const DEFAULT_BLOCK_LEN: usize = 32;

/// Upper limit on the block length. It keeps the scratch memory of a rank
/// within the budget of a small local store.
pub const MAX_BLOCK_LEN: usize = 4096;

/// The scratch buffers used by a single rank.
///
/// - `staged` holds up to [`MAX_ARRAY`] blocks of incoming single precision
///   records (one block-sized slot per array)
/// - `sum` holds the double precision running sum of a block
/// - `out` holds the outgoing single precision block
pub struct BlockScratch<'s> {
    staged: &'s mut [AccumulatorRecord],
    sum: &'s mut [WideRecord],
    out: &'s mut [AccumulatorRecord],
    block_len: usize,
}

impl<'s> BlockScratch<'s> {
    /// The number of staged records required for a block length
    pub const fn staged_len(block_len: usize) -> usize {
        MAX_ARRAY * block_len
    }

    pub fn new(
        staged: &'s mut [AccumulatorRecord],
        sum: &'s mut [WideRecord],
        out: &'s mut [AccumulatorRecord],
        block_len: usize,
    ) -> Result<Self, &'static str> {
        if block_len == 0 || block_len > MAX_BLOCK_LEN {
            Err("block_len must be positive and must not exceed MAX_BLOCK_LEN")
        } else if staged.len() < Self::staged_len(block_len) {
            Err("staged must have room for MAX_ARRAY blocks")
        } else if sum.len() < block_len || out.len() < block_len {
            Err("sum and out must each have room for a block")
        } else {
            Ok(BlockScratch {
                staged,
                sum,
                out,
                block_len,
            })
        }
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }
}

/// Summarizes the work done by a rank
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankReport {
    pub range: Range<usize>,
    pub n_block: usize,
    pub n_record: usize,
}

impl RankReport {
    pub fn empty(range: Range<usize>) -> Self {
        RankReport {
            range,
            n_block: 0,
            n_record: 0,
        }
    }
}

/// The ways [`reduce_rank`] can fail
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RankError {
    /// the number of arrays lies outside of `2..=MAX_ARRAY`
    ArrayCount(usize),
    Transfer(TransferError),
}

impl From<TransferError> for RankError {
    fn from(err: TransferError) -> Self {
        RankError::Transfer(err)
    }
}

impl core::fmt::Display for RankError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            RankError::ArrayCount(n_array) => write!(
                f,
                "can't reduce {n_array} arrays, the count must lie between 2 and {MAX_ARRAY}"
            ),
            RankError::Transfer(err) => write!(f, "{err}"),
        }
    }
}

/// Reduce the `n_array` arrays over `range` (global record indices), moving
/// data with `engine`.
///
/// On return, the write of the final block may still be in flight. Call
/// [`TransferEngine::finish`] before treating array 0 as final.
///
/// An empty `range` issues no transfers at all.
pub fn reduce_rank<'s, E: TransferEngine<'s>>(
    engine: &mut E,
    range: Range<usize>,
    n_array: usize,
    scratch: BlockScratch<'s>,
) -> Result<RankReport, RankError> {
    if !(2..=MAX_ARRAY).contains(&n_array) {
        return Err(RankError::ArrayCount(n_array));
    }

    let BlockScratch {
        staged,
        sum,
        out,
        block_len,
    } = scratch;

    // carve out one slot per array. A slot is `None` while its buffer is
    // owned by the engine
    let mut slots: [Option<&'s mut [AccumulatorRecord]>; MAX_ARRAY] =
        core::array::from_fn(|_| None);
    for (slot, chunk) in slots
        .iter_mut()
        .zip(staged.chunks_exact_mut(block_len))
        .take(n_array)
    {
        *slot = Some(chunk);
    }
    let mut out_slot = Some(&mut out[..block_len]);
    let out_tag = Tag::output(n_array);

    let mut report = RankReport::empty(range.clone());
    let mut blocks = block_ranges(range, block_len).peekable();

    // prime the pipeline with the first block of every array
    if let Some(first) = blocks.peek() {
        for (array, slot) in slots.iter_mut().take(n_array).enumerate() {
            let tag = Tag::input(array);
            let buf = slot.take().ok_or(TransferError::TagBusy(tag))?;
            engine.begin_get(tag, array, first.clone(), buf)?;
        }
    }

    while let Some(block) = blocks.next() {
        let next = blocks.peek().cloned();
        let len = block.len();

        for (array, slot) in slots.iter_mut().take(n_array).enumerate() {
            let tag = Tag::input(array);
            let buf = engine.wait(tag)?.ok_or(TransferError::NotPending(tag))?;
            if array == 0 {
                promote_block(&buf[..len], sum);
            } else {
                accumulate_block(&buf[..len], sum);
            }

            // the buffer's contents have been consumed, so it can be refilled
            match next {
                Some(ref next) => engine.begin_get(tag, array, next.clone(), buf)?,
                None => *slot = Some(buf),
            }
        }

        // the output buffer is free once the previous block's write is done
        let buf = match engine.wait(out_tag)? {
            Some(buf) => buf,
            None => out_slot.take().ok_or(TransferError::NotPending(out_tag))?,
        };
        demote_block(&sum[..len], &mut buf[..len]);
        engine.begin_put(out_tag, block, buf)?;

        report.n_block += 1;
        report.n_record += len;
    }

    Ok(report)
}
