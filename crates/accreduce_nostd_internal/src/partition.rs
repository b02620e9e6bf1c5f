//! Static work decomposition among pipeline ranks.
//!
//! Every rank owns a contiguous, disjoint range of record indices. The full
//! blocks are spread as evenly as possible (using round-to-nearest block
//! boundaries) and the last rank additionally picks up the partial block at
//! the tail of the index range, if there is one.

use core::ops::Range;

/// Compute the index of the first full block owned by `rank`.
///
/// This is `round(n_block * rank / n_rank)` evaluated in exact integer
/// arithmetic, so that the decomposition never depends on floating point
/// rounding.
fn first_block(n_block: usize, rank: usize, n_rank: usize) -> usize {
    let numerator = 2 * (n_block as u128) * (rank as u128) + (n_rank as u128);
    (numerator / (2 * n_rank as u128)) as usize
}

/// Returns the range of record indices, `[start, end)`, owned by `rank` when
/// `n` records are split among `n_rank` ranks in units of `block_len`.
///
/// Properties:
/// - the ranges of ranks `0..n_rank` are disjoint and their union is `[0, n)`
/// - `start` is always a multiple of `block_len`; so is the range length for
///   every rank other than `n_rank - 1` (which owns the tail)
/// - when `n_rank` exceeds the number of blocks, some ranks get an empty
///   range
///
/// # Panics
/// Panics if `block_len` is 0 or `rank >= n_rank`. Callers are expected to
/// have validated these values beforehand.
pub fn distribute(n: usize, block_len: usize, rank: usize, n_rank: usize) -> Range<usize> {
    assert!(block_len > 0, "block_len must be positive");
    assert!(rank < n_rank, "rank must be smaller than n_rank");

    let n_block = n / block_len;
    let start = block_len * first_block(n_block, rank, n_rank);
    let end = if rank + 1 == n_rank {
        n
    } else {
        block_len * first_block(n_block, rank + 1, n_rank)
    };
    start..end
}

/// Iterator over the consecutive blocks of an owned range.
///
/// Every block has a length of `block_len`, except for possibly the last one.
#[derive(Clone, Debug)]
pub struct BlockRanges {
    next: usize,
    end: usize,
    block_len: usize,
}

impl Iterator for BlockRanges {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        if self.next >= self.end {
            None
        } else {
            let start = self.next;
            self.next = self.end.min(start + self.block_len);
            Some(start..self.next)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.end.saturating_sub(self.next)).div_ceil(self.block_len);
        (n, Some(n))
    }
}

impl ExactSizeIterator for BlockRanges {}

pub fn block_ranges(range: Range<usize>, block_len: usize) -> BlockRanges {
    assert!(block_len > 0, "block_len must be positive");
    BlockRanges {
        next: range.start,
        end: range.end,
        block_len,
    }
}
