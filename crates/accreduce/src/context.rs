use crate::parallel::split_views;
use crate::{Error, ReduceConfig};
use accreduce_nostd_internal::{
    AccumulatorPackViewMut, AccumulatorRecord, DEFAULT_BLOCK_LEN, MAX_ARRAY, MAX_BLOCK_LEN,
};

/// The immutable description of a single reduction.
///
/// Construction performs all of the validation, so the kernel itself never
/// needs to second-guess its arguments.
///
/// # No-op reductions
/// A context with fewer than 2 arrays is valid, but there is nothing to
/// reduce: every entry point returns immediately without touching memory
/// (see [`ReductionContext::is_noop`]). A context with more than
/// [`MAX_ARRAY`] arrays is rejected outright.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReductionContext {
    n: usize,
    n_array: usize,
    s_array: usize,
    block_len: usize,
}

impl ReductionContext {
    /// Describe the reduction of `n_array` arrays holding `n` records each,
    /// where consecutive arrays start `s_array` records apart.
    pub fn new(n: usize, n_array: usize, s_array: usize) -> Result<Self, Error> {
        Self::with_block_len(n, n_array, s_array, DEFAULT_BLOCK_LEN)
    }

    pub fn from_config(
        n: usize,
        n_array: usize,
        s_array: usize,
        config: &ReduceConfig,
    ) -> Result<Self, Error> {
        Self::with_block_len(n, n_array, s_array, config.block_len)
    }

    pub fn with_block_len(
        n: usize,
        n_array: usize,
        s_array: usize,
        block_len: usize,
    ) -> Result<Self, Error> {
        if n_array > MAX_ARRAY {
            Err(Error::integer_range(
                "n_array",
                n_array as i64,
                0,
                MAX_ARRAY as i64,
            ))
        } else if block_len == 0 || block_len > MAX_BLOCK_LEN {
            Err(Error::integer_range(
                "block_len",
                block_len as i64,
                1,
                MAX_BLOCK_LEN as i64,
            ))
        } else if n_array > 1 && s_array < n {
            Err(Error::layout(
                "the stride between arrays can't be smaller than an array",
            ))
        } else {
            Ok(ReductionContext {
                n,
                n_array,
                s_array,
                block_len,
            })
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn n_array(&self) -> usize {
        self.n_array
    }

    pub fn s_array(&self) -> usize {
        self.s_array
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Returns whether there is nothing to reduce (fewer than 2 arrays)
    pub fn is_noop(&self) -> bool {
        self.n_array < 2
    }

    /// the minimum number of records the backing slice must hold, or `None`
    /// if that count can't be represented
    pub fn required_len(&self) -> Option<usize> {
        AccumulatorPackViewMut::required_len(self.n_array, self.n, self.s_array)
    }

    pub fn check_rank(&self, rank: usize, n_pipeline: usize) -> Result<(), Error> {
        if n_pipeline == 0 {
            Err(Error::integer_range("n_pipeline", 0, 1, i64::MAX))
        } else if rank >= n_pipeline {
            Err(Error::integer_range(
                "rank",
                rank as i64,
                0,
                n_pipeline as i64 - 1,
            ))
        } else {
            Ok(())
        }
    }

    /// Wrap `data` in a view that matches this context
    pub fn view<'a>(
        &self,
        data: &'a mut [AccumulatorRecord],
    ) -> Result<AccumulatorPackViewMut<'a>, Error> {
        match self.required_len() {
            None => {
                return Err(Error::layout(
                    "the stride between arrays is too large to address",
                ));
            }
            Some(len) if data.len() < len => {
                return Err(Error::layout("the slice is too short to hold every array"));
            }
            Some(_) => {}
        }
        AccumulatorPackViewMut::from_slice(data, self.n_array, self.n, self.s_array)
            .map_err(Error::layout)
    }
}

impl ReductionContext {
    /// Split `data` into one view per rank, where the view at index `rank`
    /// covers the records that `rank` owns out of `n_pipeline` ranks.
    ///
    /// The views are disjoint, so each can be handed to [`crate::reduce_pipeline`]
    /// on a separate thread. A context without any arrays yields no views.
    pub fn rank_views<'a>(
        &self,
        data: &'a mut [AccumulatorRecord],
        n_pipeline: usize,
    ) -> Result<Vec<AccumulatorPackViewMut<'a>>, Error> {
        self.check_rank(0, n_pipeline)?;
        if self.n_array == 0 {
            return Ok(Vec::new());
        }
        let pack = self.view(data)?;
        Ok(split_views(pack, self.block_len, n_pipeline))
    }
}
