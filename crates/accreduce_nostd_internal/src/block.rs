// Block-level arithmetic used by the reducer.
//
// The only order sensitive part of the whole reduction lives here: a block's
// running sum is always initialized from array 0 and then extended by arrays
// 1, 2, ... in that order. Each field and lane is handled independently.

use crate::record::{AccumulatorRecord, WideRecord};

/// Overwrite `sum` with the double precision version of `src`.
///
/// Only the first `src.len()` entries of `sum` are touched.
pub fn promote_block(src: &[AccumulatorRecord], sum: &mut [WideRecord]) {
    assert!(sum.len() >= src.len());
    for (wide, record) in sum.iter_mut().zip(src.iter()) {
        wide.assign_promoted(record);
    }
}

/// Add the double precision version of `src` into `sum`.
pub fn accumulate_block(src: &[AccumulatorRecord], sum: &mut [WideRecord]) {
    assert!(sum.len() >= src.len());
    for (wide, record) in sum.iter_mut().zip(src.iter()) {
        wide.add_promoted(record);
    }
}

/// Round the first `dst.len()` entries of `sum` to single precision and store
/// them in `dst`.
pub fn demote_block(sum: &[WideRecord], dst: &mut [AccumulatorRecord]) {
    assert!(sum.len() >= dst.len());
    for (record, wide) in dst.iter_mut().zip(sum.iter()) {
        *record = wide.demote();
    }
}
