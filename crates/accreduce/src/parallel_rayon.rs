//! Implements a backend that runs each pipeline rank as a rayon task

use crate::parallel::{Executor, check_pack, run_rank, split_ranks};
use crate::scratch::ScratchArena;
use crate::{Error, ReduceConfig, ReductionContext, TransferMode};
use accreduce_nostd_internal::{AccumulatorPackViewMut, RankReport};
use rayon::prelude::*;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Runs the ranks concurrently in a dedicated thread pool with one thread
/// per rank.
pub struct RayonExecutor {
    pool: rayon::ThreadPool,
    n_pipeline: NonZeroUsize,
    transfer: TransferMode,
    timeout: Option<Duration>,
}

impl RayonExecutor {
    pub fn new(n_pipeline: NonZeroUsize) -> Result<Self, Error> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_pipeline.get())
            .thread_name(|i| format!("accreduce-rank-{i}"))
            .build()
            .map_err(|e| Error::thread_pool(e.to_string()))?;
        Ok(RayonExecutor {
            pool,
            n_pipeline,
            transfer: TransferMode::default(),
            timeout: None,
        })
    }

    pub fn from_config(config: &ReduceConfig) -> Result<Self, Error> {
        let n_pipeline = NonZeroUsize::new(config.n_pipeline())
            .ok_or_else(|| Error::integer_range("n_pipeline", 0, 1, i64::MAX))?;
        let mut executor = Self::new(n_pipeline)?;
        executor.transfer = config.transfer;
        executor.timeout = config.wait_timeout();
        Ok(executor)
    }

    pub fn with_transfer(mut self, transfer: TransferMode) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn n_pipeline(&self) -> usize {
        self.n_pipeline.get()
    }
}

impl Executor for RayonExecutor {
    fn drive_reduce(
        &mut self,
        pack: AccumulatorPackViewMut<'_>,
        ctx: &ReductionContext,
    ) -> Result<Vec<RankReport>, Error> {
        if ctx.is_noop() {
            return Ok(Vec::new());
        }
        check_pack(&pack, ctx)?;
        let n_pipeline = self.n_pipeline.get();
        log::debug!(
            "parallel reduction of {} arrays x {} records with {} ranks ({:?} transfers)",
            ctx.n_array(),
            ctx.n(),
            n_pipeline,
            self.transfer
        );

        // reserve all of the scratch memory up front so that an allocation
        // failure is reported before any rank starts writing
        let mut arenas = (0..n_pipeline)
            .map(|_| ScratchArena::try_new(ctx.block_len()))
            .collect::<Result<Vec<_>, Error>>()?;
        let storages = split_ranks(pack, ctx.block_len(), n_pipeline)?;

        let n_array = ctx.n_array();
        let transfer = self.transfer;
        let timeout = self.timeout;

        // collecting the results doubles as the completion barrier: every
        // rank has drained its transfers by the time it yields a report
        self.pool.install(|| {
            storages
                .into_par_iter()
                .zip(arenas.par_iter_mut())
                .map(|(storage, arena)| run_rank(storage, arena, n_array, transfer, timeout))
                .collect::<Result<Vec<_>, Error>>()
        })
    }
}
