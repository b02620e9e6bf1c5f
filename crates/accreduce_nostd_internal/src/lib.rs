#![no_std]
//! The `no_std` core of the accumulator reduction.
//!
//! Everything in here is written so that it could run on a coprocessor with
//! a small local memory: the kernel never allocates, all scratch memory is
//! provided by the caller, and data only moves between bulk storage and the
//! scratch buffers through a [`TransferEngine`].

mod block;
mod pack;
mod partition;
mod record;
mod reducer;
mod transfer;

pub use block::{accumulate_block, demote_block, promote_block};
pub use pack::{AccumulatorPackViewMut, RankStorage};
pub use partition::{BlockRanges, block_ranges, distribute};
pub use record::{AccumulatorRecord, N_FIELDS, N_LANES, WideRecord};
pub use reducer::{
    BlockScratch, DEFAULT_BLOCK_LEN, MAX_BLOCK_LEN, RankError, RankReport, reduce_rank,
};
pub use transfer::{
    ImmediateTransfer, MAX_ARRAY, MAX_TAGS, Tag, TagSlots, TransferEngine, TransferError,
};
