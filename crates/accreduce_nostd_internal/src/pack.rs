use crate::partition::distribute;
use crate::record::AccumulatorRecord;
use crate::transfer::{MAX_ARRAY, TransferError};
use core::ops::Range;
use ndarray::{ArrayView1, ArrayViewMut2, Axis, ShapeBuilder};

/// Represents a collection of same-shaped accumulator arrays that live in
/// a single allocation ("an array of arrays").
///
/// Array `r` holds its records at offsets `[r*s_array, r*s_array + n)`. The
/// records between `n` and `s_array` (padding between arrays) are never
/// touched.
///
/// # Note
/// Wrapping ArrayViewMut2 keeps every use of ndarray confined to this file.
#[derive(Debug)]
pub struct AccumulatorPackViewMut<'a> {
    // axis 0 is the array index and axis 1 is the record index
    data: ArrayViewMut2<'a, AccumulatorRecord>,
    // the global index of the first record in this view (this is nonzero
    // after a view has been split into ranks)
    offset: usize,
}

impl<'a> AccumulatorPackViewMut<'a> {
    /// the minimum number of records a slice needs for the given layout, or
    /// `None` if that count overflows `usize`
    pub fn required_len(n_array: usize, n: usize, s_array: usize) -> Option<usize> {
        if n_array == 0 {
            Some(0)
        } else {
            (n_array - 1).checked_mul(s_array)?.checked_add(n)
        }
    }

    pub fn from_slice(
        data: &'a mut [AccumulatorRecord],
        n_array: usize,
        n: usize,
        s_array: usize,
    ) -> Result<Self, &'static str> {
        if n_array == 0 || n_array > MAX_ARRAY {
            Err("the number of arrays must lie between 1 and MAX_ARRAY")
        } else if n_array > 1 && s_array < n {
            Err("the stride between arrays can't be smaller than an array")
        } else if Self::required_len(n_array, n, s_array).is_none_or(|len| data.len() < len) {
            Err("the slice is too short to hold every array")
        } else {
            // ndarray rejects a few degenerate stride combinations (e.g. a
            // zero stride along an axis with multiple entries), so we
            // normalize the stride when there's only a single array
            let stride = if n_array == 1 { n.max(1) } else { s_array };
            let data = ArrayViewMut2::from_shape((n_array, n).strides((stride, 1)), data)
                .map_err(|_| "unable to construct a view with the given layout")?;
            Ok(Self { data, offset: 0 })
        }
    }

    pub fn n_array(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// the number of records in each array of the view
    pub fn n_records(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// the global record indices covered by this view
    pub fn owned_range(&self) -> Range<usize> {
        self.offset..(self.offset + self.n_records())
    }

    /// a view of the records of `array` (indices are local to the view)
    pub fn array(&self, array: usize) -> ArrayView1<AccumulatorRecord> {
        self.data.index_axis(Axis(0), array)
    }

    /// Split off the first `len` records of every array.
    ///
    /// # Panics
    /// Panics if `len > self.n_records()`
    pub fn split_front(self, len: usize) -> (Self, Self) {
        let offset = self.offset;
        let (front, back) = self.data.split_at(Axis(1), len);
        (
            Self {
                data: front,
                offset,
            },
            Self {
                data: back,
                offset: offset + len,
            },
        )
    }

    /// Restrict the view to the records owned by `rank` (see
    /// [`distribute`]). This is intended to be called on a view that hasn't
    /// been split.
    pub fn select_rank(self, block_len: usize, rank: usize, n_rank: usize) -> Self {
        let range = distribute(self.n_records(), block_len, rank, n_rank);
        let (_, back) = self.split_front(range.start);
        let (mine, _) = back.split_front(range.len());
        mine
    }

    /// Consume the view to produce the storage accessed by a transfer engine
    pub fn into_rank_storage(self) -> Result<RankStorage<'a>, &'static str> {
        let owned = self.owned_range();
        let n_array = self.n_array();

        let (head, mut rest) = self.data.split_at(Axis(0), 1);
        let out = head
            .index_axis_move(Axis(0), 0)
            .into_slice()
            .ok_or("the records of an array must be contiguous")?;

        let mut inputs: [&'a [AccumulatorRecord]; MAX_ARRAY] = [&[]; MAX_ARRAY];
        for input in inputs.iter_mut().take(n_array).skip(1) {
            let (head, tail) = rest.split_at(Axis(0), 1);
            let slice: &'a [AccumulatorRecord] = head
                .index_axis_move(Axis(0), 0)
                .into_slice()
                .ok_or("the records of an array must be contiguous")?;
            *input = slice;
            rest = tail;
        }

        Ok(RankStorage {
            owned,
            n_array,
            out,
            inputs,
        })
    }
}

/// The slice of bulk storage that a single rank may touch.
///
/// Array 0 doubles as the output array, so it is held mutably. The other
/// arrays are only ever read.
pub struct RankStorage<'a> {
    owned: Range<usize>,
    n_array: usize,
    out: &'a mut [AccumulatorRecord],
    // entry 0 is unused (reads of array 0 go through `out`)
    inputs: [&'a [AccumulatorRecord]; MAX_ARRAY],
}

impl<'a> RankStorage<'a> {
    pub fn owned_range(&self) -> Range<usize> {
        self.owned.clone()
    }

    pub fn n_array(&self) -> usize {
        self.n_array
    }

    /// translate global record indices into offsets local to this rank
    fn local_range(
        &self,
        records: &Range<usize>,
        capacity: usize,
    ) -> Result<Range<usize>, TransferError> {
        if records.is_empty() || records.len() > capacity {
            Err(TransferError::Misaligned {
                len: records.len(),
                capacity,
            })
        } else if records.start < self.owned.start || records.end > self.owned.end {
            Err(TransferError::OutOfRange {
                requested: records.clone(),
                owned: self.owned.clone(),
            })
        } else {
            Ok((records.start - self.owned.start)..(records.end - self.owned.start))
        }
    }

    /// copy `records` of `array` into the front of `dst`
    pub fn read_into(
        &self,
        array: usize,
        records: Range<usize>,
        dst: &mut [AccumulatorRecord],
    ) -> Result<(), TransferError> {
        if array >= self.n_array {
            return Err(TransferError::UnknownArray(array));
        }
        let local = self.local_range(&records, dst.len())?;
        let src = if array == 0 {
            &self.out[local]
        } else {
            &self.inputs[array][local]
        };
        dst[..src.len()].copy_from_slice(src);
        Ok(())
    }

    /// copy the front of `src` into `records` of the output array
    pub fn write_from(
        &mut self,
        records: Range<usize>,
        src: &[AccumulatorRecord],
    ) -> Result<(), TransferError> {
        let local = self.local_range(&records, src.len())?;
        let len = local.len();
        self.out[local].copy_from_slice(&src[..len]);
        Ok(())
    }
}
