use crate::parallel::run_rank;
use crate::scratch::ScratchArena;
use crate::{Error, Executor, RayonExecutor, ReduceConfig, ReductionContext, SerialExecutor};
use accreduce_nostd_internal::{
    AccumulatorPackViewMut, AccumulatorRecord, RankReport, distribute,
};

/// Reduce every array described by `ctx` into array 0 of `data`.
///
/// The ranks run concurrently when `config` asks for more than one of them.
/// Arrays other than array 0 are left untouched. When `ctx` has fewer than 2
/// arrays, nothing happens.
///
/// Every call with more than one rank builds (and tears down) a thread
/// pool. Callers that reduce on every step should hold onto a
/// [`RayonExecutor`] and call [`Executor::drive_reduce`] instead.
pub fn reduce_accumulators(
    data: &mut [AccumulatorRecord],
    ctx: &ReductionContext,
    config: &ReduceConfig,
) -> Result<Vec<RankReport>, Error> {
    if ctx.is_noop() {
        log::debug!(
            "skipping reduction of {} array(s), there is nothing to combine",
            ctx.n_array()
        );
        return Ok(Vec::new());
    }
    let pack = ctx.view(data)?;
    if config.n_pipeline() == 1 {
        SerialExecutor::from_config(config)?.drive_reduce(pack, ctx)
    } else {
        RayonExecutor::from_config(config)?.drive_reduce(pack, ctx)
    }
}

/// Perform the portion of the reduction owned by `rank` out of `n_pipeline`
/// ranks.
///
/// This is the entry point for callers that manage their own pool of
/// execution units. `view` must be the entry at index `rank` of
/// [`ReductionContext::rank_views`], called with the same `n_pipeline`.
/// Since the views are disjoint, the ranks can run concurrently. Once every
/// rank in `0..n_pipeline` has returned, array 0 holds the full result.
///
/// ```
/// use accreduce::{AccumulatorRecord, ReduceConfig, ReductionContext, reduce_pipeline};
///
/// let mut data = vec![AccumulatorRecord::splat(1.0); 2 * 100];
/// let ctx = ReductionContext::new(100, 2, 100).unwrap();
/// let config = ReduceConfig::default();
/// let n_pipeline = 3;
///
/// let views = ctx.rank_views(&mut data, n_pipeline).unwrap();
/// std::thread::scope(|scope| {
///     for (rank, view) in views.into_iter().enumerate() {
///         let (ctx, config) = (&ctx, &config);
///         scope.spawn(move || reduce_pipeline(view, ctx, rank, n_pipeline, config).unwrap());
///     }
/// });
/// assert!(data[..100].iter().all(|rec| *rec == AccumulatorRecord::splat(2.0)));
/// ```
pub fn reduce_pipeline(
    view: AccumulatorPackViewMut<'_>,
    ctx: &ReductionContext,
    rank: usize,
    n_pipeline: usize,
    config: &ReduceConfig,
) -> Result<RankReport, Error> {
    ctx.check_rank(rank, n_pipeline)?;
    let range = distribute(ctx.n(), ctx.block_len(), rank, n_pipeline);
    if view.n_array() != ctx.n_array() || view.owned_range() != range {
        return Err(Error::layout(
            "the view doesn't cover the records owned by the rank",
        ));
    }
    if ctx.is_noop() {
        return Ok(RankReport::empty(range));
    }

    let storage = view.into_rank_storage().map_err(Error::layout)?;
    let mut arena = ScratchArena::try_new(ctx.block_len())?;
    run_rank(
        storage,
        &mut arena,
        ctx.n_array(),
        config.transfer,
        config.wait_timeout(),
    )
}
