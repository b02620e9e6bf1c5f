/*!
Provides a parallel reduction of per-voxel field accumulators, as used by
particle-in-cell (PIC) plasma simulations.

# Background

During a PIC step, every particle deposits its current onto the voxels it
crosses. To avoid write contention, the deposition is carried out into
several copies of the accumulator array (typically one per thread). Before
the accumulated currents can be used, these copies must be combined into a
single array. That is the job of this crate.

# Numerics

Each record holds a few single precision vector fields. When the copies are
combined, every value is promoted to double precision, the copies are summed
in a fixed order (array 0, then array 1, ...), and the result is rounded
back to single precision. Consequently:
- small contributions aren't lost when they are added to large values (to
  the extent that double precision allows)
- the result is bitwise reproducible, no matter how many ranks perform the
  reduction

# Usage

```
use accreduce::{AccumulatorRecord, ReduceConfig, ReductionContext, reduce_accumulators};

// three arrays of 64 records, stored back to back
let mut data: Vec<AccumulatorRecord> = (0..3)
    .flat_map(|r| std::iter::repeat(AccumulatorRecord::splat((r + 1) as f32)).take(64))
    .collect();

let ctx = ReductionContext::new(64, 3, 64).unwrap();
reduce_accumulators(&mut data, &ctx, &ReduceConfig::default()).unwrap();
assert!(data[..64].iter().all(|rec| *rec == AccumulatorRecord::splat(6.0)));
```

[`reduce_accumulators`] builds a fresh thread pool whenever it runs more
than one rank. A simulation that reduces its accumulators on every step
should build a [`RayonExecutor`] once and reuse it:

```
use accreduce::{AccumulatorRecord, Executor, RayonExecutor, ReductionContext};
use std::num::NonZeroUsize;

let mut executor = RayonExecutor::new(NonZeroUsize::new(2).unwrap()).unwrap();
let ctx = ReductionContext::new(64, 2, 64).unwrap();
let mut data = vec![AccumulatorRecord::splat(0.5); 128];
for _step in 0..3 {
    executor.drive_reduce(ctx.view(&mut data).unwrap(), &ctx).unwrap();
}
assert_eq!(data[0], AccumulatorRecord::splat(2.0));
```

Callers that manage their own execution units can split the arrays with
[`ReductionContext::rank_views`] and hand each view to [`reduce_pipeline`].

# Developer Guide

The reduction kernel itself lives in [`accreduce_nostd_internal`], which
never allocates and never blocks except when it waits on a transfer. This
crate supplies validation, scratch memory, an asynchronous transfer engine
and the executors that schedule ranks.
*/

#![deny(rustdoc::broken_intra_doc_links)]

// inform build-system of the crates in this package
mod apply;
mod config;
mod context;
mod error;
mod parallel;
mod parallel_rayon;
mod parallel_serial;
mod scratch;
mod transfer_channel;

// pull in symbols that are visible outside of the package
pub use accreduce_nostd_internal::{
    AccumulatorPackViewMut, AccumulatorRecord, BlockScratch, DEFAULT_BLOCK_LEN,
    ImmediateTransfer, MAX_ARRAY, MAX_BLOCK_LEN, N_FIELDS, N_LANES, RankError, RankReport,
    RankStorage, Tag, TransferEngine, TransferError, WideRecord, block_ranges, distribute,
    reduce_rank,
};
pub use apply::{reduce_accumulators, reduce_pipeline};
pub use config::{ReduceConfig, TransferMode};
pub use context::ReductionContext;
pub use error::{Error, ErrorCategory};
pub use parallel::Executor;
pub use parallel_rayon::RayonExecutor;
pub use parallel_serial::SerialExecutor;
pub use scratch::ScratchArena;
pub use transfer_channel::ChannelTransfer;
