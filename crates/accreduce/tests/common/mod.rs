// the reason this is named mod.rs has to do with some complexities of how
// testing is handled
//
// we are following the advice of the rust book
// https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests

#![allow(dead_code)] // not every test file uses every helper

use accreduce::{AccumulatorRecord, N_FIELDS, N_LANES};
use rand::distr::{Distribution, Uniform};
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Owns an array-of-arrays together with a description of its layout
#[derive(Clone)]
pub struct OwnedArrays {
    pub n: usize,
    pub n_array: usize,
    pub s_array: usize,
    pub data: Vec<AccumulatorRecord>,
}

impl OwnedArrays {
    /// the record `i` of `array`
    pub fn get(&self, array: usize, i: usize) -> &AccumulatorRecord {
        &self.data[array * self.s_array + i]
    }

    pub fn array(&self, array: usize) -> &[AccumulatorRecord] {
        let start = array * self.s_array;
        &self.data[start..(start + self.n)]
    }
}

/// build arrays where every scalar of array `r` holds `f(r, i)`
pub fn arrays_from_fn(
    n: usize,
    n_array: usize,
    s_array: usize,
    f: impl Fn(usize, usize) -> f32,
) -> OwnedArrays {
    // padding records are filled with NaN so that we notice if they leak
    // into the result
    let mut data = vec![AccumulatorRecord::splat(f32::NAN); n_array.max(1) * s_array.max(n)];
    for r in 0..n_array {
        for i in 0..n {
            data[r * s_array + i] = AccumulatorRecord::splat(f(r, i));
        }
    }
    OwnedArrays {
        n,
        n_array,
        s_array,
        data,
    }
}

/// build arrays filled with random values in `[-scale, scale)`
pub fn random_arrays(
    seed: u64,
    n: usize,
    n_array: usize,
    s_array: usize,
    scale: f32,
) -> OwnedArrays {
    let mut my_rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let value_dist = Uniform::try_from(-scale..scale).unwrap();

    let mut out = arrays_from_fn(n, n_array, s_array, |_, _| 0.0);
    for r in 0..n_array {
        for i in 0..n {
            let rec = &mut out.data[r * s_array + i];
            for field in rec.fields.iter_mut() {
                for lane in field.iter_mut() {
                    *lane = value_dist.sample(&mut my_rng);
                }
            }
        }
    }
    out
}

/// sum record `i` across the arrays in double precision (in array order)
/// and round the result to single precision
pub fn reference_double(arrays: &OwnedArrays, i: usize) -> AccumulatorRecord {
    let mut sum = [[0.0_f64; N_LANES]; N_FIELDS];
    for r in 0..arrays.n_array {
        let rec = arrays.get(r, i);
        for f in 0..N_FIELDS {
            for k in 0..N_LANES {
                sum[f][k] += rec.fields[f][k] as f64;
            }
        }
    }
    let mut out = AccumulatorRecord::zeroed();
    for f in 0..N_FIELDS {
        for k in 0..N_LANES {
            out.fields[f][k] = sum[f][k] as f32;
        }
    }
    out
}

/// sum record `i` across the arrays with a naive single precision running
/// sum
pub fn reference_single(arrays: &OwnedArrays, i: usize) -> AccumulatorRecord {
    let mut out = *arrays.get(0, i);
    for r in 1..arrays.n_array {
        let rec = arrays.get(r, i);
        for f in 0..N_FIELDS {
            for k in 0..N_LANES {
                out.fields[f][k] += rec.fields[f][k];
            }
        }
    }
    out
}

/// assert that every scalar of `actual` lies within `max_ulps` of `expected`
pub fn assert_record_ulps(actual: &AccumulatorRecord, expected: &AccumulatorRecord, max_ulps: u32) {
    for (a, e) in actual.scalars().zip(expected.scalars()) {
        approx::assert_ulps_eq!(a, e, max_ulps = max_ulps);
    }
}
