//! Shared machinery for driving a reduction across pipeline ranks.
//!
//! A reduction is embarrassingly parallel at the rank level: every rank owns
//! a disjoint range of records (in every array) and never communicates with
//! the other ranks. The executors only differ in how they schedule ranks.

use crate::scratch::ScratchArena;
use crate::transfer_channel::ChannelTransfer;
use crate::{Error, ReductionContext, TransferMode};
use accreduce_nostd_internal::{
    AccumulatorPackViewMut, ImmediateTransfer, RankReport, RankStorage, TransferEngine,
    distribute, reduce_rank,
};
use std::time::Duration;

/// a trait for expressing how to launch a reduction
///
/// Implementations run every rank to completion (including the final
/// outbound transfer) before returning, so array 0 of `pack` holds the final
/// result once `drive_reduce` returns successfully.
pub trait Executor {
    fn drive_reduce(
        &mut self,
        pack: AccumulatorPackViewMut<'_>,
        ctx: &ReductionContext,
    ) -> Result<Vec<RankReport>, Error>;
}

/// check that `pack` was built from `ctx`
pub(crate) fn check_pack(pack: &AccumulatorPackViewMut, ctx: &ReductionContext) -> Result<(), Error> {
    if pack.n_array() != ctx.n_array() || pack.owned_range() != (0..ctx.n()) {
        Err(Error::layout(
            "the accumulator view doesn't match the reduction context",
        ))
    } else {
        Ok(())
    }
}

/// the number of ranks that own no records when `n` records are split among
/// `n_pipeline` ranks
pub(crate) fn count_idle_ranks(n: usize, block_len: usize, n_pipeline: usize) -> usize {
    if n == 0 {
        return 0;
    }
    (0..n_pipeline)
        .filter(|&rank| distribute(n, block_len, rank, n_pipeline).is_empty())
        .count()
}

/// Split `pack` into one view per rank, each covering the records that the
/// rank owns (see [`distribute`])
pub(crate) fn split_views<'a>(
    pack: AccumulatorPackViewMut<'a>,
    block_len: usize,
    n_pipeline: usize,
) -> Vec<AccumulatorPackViewMut<'a>> {
    let n = pack.n_records();
    let n_idle = count_idle_ranks(n, block_len, n_pipeline);
    if n_idle > 0 {
        log::warn!(
            "{n_idle} of {n_pipeline} ranks own no records ({n} records, blocks of {block_len}), \
             so they will sit idle"
        );
    }

    let mut out = Vec::with_capacity(n_pipeline);
    let mut rest = pack;
    for rank in 0..n_pipeline {
        let range = distribute(n, block_len, rank, n_pipeline);
        debug_assert_eq!(rest.owned_range().start, range.start);
        let (mine, tail) = rest.split_front(range.len());
        out.push(mine);
        rest = tail;
    }
    out
}

/// Split `pack` into the storage owned by each of the `n_pipeline` ranks
pub(crate) fn split_ranks<'a>(
    pack: AccumulatorPackViewMut<'a>,
    block_len: usize,
    n_pipeline: usize,
) -> Result<Vec<RankStorage<'a>>, Error> {
    split_views(pack, block_len, n_pipeline)
        .into_iter()
        .map(|view| view.into_rank_storage().map_err(Error::layout))
        .collect()
}

/// Run the block reducer for a single rank and wait for all of its
/// transfers to complete.
pub(crate) fn run_rank(
    storage: RankStorage<'_>,
    arena: &mut ScratchArena,
    n_array: usize,
    transfer: TransferMode,
    timeout: Option<Duration>,
) -> Result<RankReport, Error> {
    let range = storage.owned_range();
    if range.is_empty() {
        log::trace!("rank with an empty range has nothing to do");
        return Ok(RankReport::empty(range));
    }
    log::trace!(
        "reducing {} arrays over records {}..{} ({:?} transfers)",
        n_array,
        range.start,
        range.end,
        transfer
    );

    let scratch = arena.block_scratch()?;
    match transfer {
        TransferMode::Immediate => {
            let mut engine = ImmediateTransfer::new(storage);
            let report = reduce_rank(&mut engine, range, n_array, scratch)?;
            engine.finish()?;
            Ok(report)
        }
        TransferMode::Threaded => {
            std::thread::scope(|scope| -> Result<RankReport, Error> {
                let mut engine = ChannelTransfer::spawn(scope, storage, timeout);
                let report = reduce_rank(&mut engine, range, n_array, scratch)?;
                engine.finish()?;
                Ok(report)
            })
        }
    }
}
