//! Implements the "serial" backend for running pipeline ranks

use crate::parallel::{Executor, check_pack, run_rank, split_ranks};
use crate::scratch::ScratchArena;
use crate::{Error, ReduceConfig, ReductionContext, TransferMode};
use accreduce_nostd_internal::{AccumulatorPackViewMut, RankReport};
use std::num::NonZeroUsize;
use std::time::Duration;

/// Runs every rank, one after another, on the calling thread.
///
/// Since ranks never interact, the results are bitwise identical to those of
/// [`crate::RayonExecutor`] for the same number of ranks (and, because the
/// summation order never depends on the decomposition, for any number of
/// ranks).
pub struct SerialExecutor {
    n_pipeline: NonZeroUsize,
    transfer: TransferMode,
    timeout: Option<Duration>,
}

impl SerialExecutor {
    pub fn new(n_pipeline: NonZeroUsize) -> Self {
        SerialExecutor {
            n_pipeline,
            transfer: TransferMode::Immediate,
            timeout: None,
        }
    }

    pub fn from_config(config: &ReduceConfig) -> Result<Self, Error> {
        let n_pipeline = NonZeroUsize::new(config.n_pipeline())
            .ok_or_else(|| Error::integer_range("n_pipeline", 0, 1, i64::MAX))?;
        Ok(SerialExecutor {
            n_pipeline,
            transfer: config.transfer,
            timeout: config.wait_timeout(),
        })
    }

    pub fn with_transfer(mut self, transfer: TransferMode) -> Self {
        self.transfer = transfer;
        self
    }

    /// bound how long a rank waits on a single transfer
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Executor for SerialExecutor {
    fn drive_reduce(
        &mut self,
        pack: AccumulatorPackViewMut<'_>,
        ctx: &ReductionContext,
    ) -> Result<Vec<RankReport>, Error> {
        if ctx.is_noop() {
            return Ok(Vec::new());
        }
        check_pack(&pack, ctx)?;
        log::debug!(
            "serial reduction of {} arrays x {} records with {} ranks",
            ctx.n_array(),
            ctx.n(),
            self.n_pipeline
        );

        // the ranks run one at a time, so they can all share an arena
        let mut arena = ScratchArena::try_new(ctx.block_len())?;
        split_ranks(pack, ctx.block_len(), self.n_pipeline.get())?
            .into_iter()
            .map(|storage| {
                run_rank(
                    storage,
                    &mut arena,
                    ctx.n_array(),
                    self.transfer,
                    self.timeout,
                )
            })
            .collect()
    }
}
