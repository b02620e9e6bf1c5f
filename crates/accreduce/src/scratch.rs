use crate::Error;
use accreduce_nostd_internal::{AccumulatorRecord, BlockScratch, WideRecord};

/// Owns the scratch buffers of a single rank.
///
/// The sizes only depend on the block length, so they are known before a
/// reduction begins. Allocation failures are reported instead of aborting.
pub struct ScratchArena {
    staged: Vec<AccumulatorRecord>,
    sum: Vec<WideRecord>,
    out: Vec<AccumulatorRecord>,
    block_len: usize,
}

fn try_filled<T: Clone>(len: usize, value: T, what: &'static str) -> Result<Vec<T>, Error> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::resource_exhausted(what, len * std::mem::size_of::<T>()))?;
    buf.resize(len, value);
    Ok(buf)
}

impl ScratchArena {
    pub fn try_new(block_len: usize) -> Result<Self, Error> {
        let staged = try_filled(
            BlockScratch::staged_len(block_len),
            AccumulatorRecord::zeroed(),
            "staged input blocks",
        )?;
        let sum = try_filled(block_len, WideRecord::zeroed(), "the running sum")?;
        let out = try_filled(block_len, AccumulatorRecord::zeroed(), "the output block")?;
        Ok(ScratchArena {
            staged,
            sum,
            out,
            block_len,
        })
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// the total number of bytes held by the arena
    pub fn n_bytes(&self) -> usize {
        (self.staged.len() + self.out.len()) * std::mem::size_of::<AccumulatorRecord>()
            + self.sum.len() * std::mem::size_of::<WideRecord>()
    }

    pub fn block_scratch(&mut self) -> Result<BlockScratch<'_>, Error> {
        BlockScratch::new(
            &mut self.staged,
            &mut self.sum,
            &mut self.out,
            self.block_len,
        )
        .map_err(Error::layout)
    }
}
