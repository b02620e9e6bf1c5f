mod common;

use accreduce::{
    AccumulatorRecord, ErrorCategory, Executor, MAX_ARRAY, RayonExecutor, ReduceConfig,
    ReductionContext, SerialExecutor, TransferMode, reduce_accumulators,
};
use common::{
    OwnedArrays, arrays_from_fn, assert_record_ulps, init_logging, random_arrays,
    reference_double, reference_single,
};
use proptest::prelude::*;
use std::num::NonZeroUsize;
use std::time::Duration;

fn config(n_pipeline: usize, transfer: TransferMode, block_len: usize) -> ReduceConfig {
    ReduceConfig {
        block_len,
        n_pipeline: Some(n_pipeline),
        transfer,
        wait_timeout_ms: None,
    }
}

fn reduce(arrays: &mut OwnedArrays, config: &ReduceConfig) {
    let ctx =
        ReductionContext::from_config(arrays.n, arrays.n_array, arrays.s_array, config).unwrap();
    reduce_accumulators(&mut arrays.data, &ctx, config).unwrap();
}

fn bits(data: &[AccumulatorRecord]) -> Vec<u32> {
    data.iter()
        .flat_map(|rec| rec.scalars().map(f32::to_bits).collect::<Vec<_>>())
        .collect()
}

// check that array 0 holds the reduction of `orig` and that nothing else
// (including padding between arrays) was touched
fn check_result(actual: &OwnedArrays, orig: &OwnedArrays) {
    for i in 0..orig.n {
        assert_eq!(
            actual.get(0, i),
            &reference_double(orig, i),
            "mismatch for record {i}"
        );
    }
    let start = orig.n.min(actual.data.len());
    assert_eq!(bits(&actual.data[start..]), bits(&orig.data[start..]));
}

#[test]
fn end_to_end_single_rank() {
    init_logging();
    let mut arrays = arrays_from_fn(64, 3, 64, |r, _| (r + 1) as f32);
    reduce(&mut arrays, &config(1, TransferMode::Immediate, 32));
    assert!(
        arrays
            .array(0)
            .iter()
            .all(|rec| *rec == AccumulatorRecord::splat(6.0))
    );
    // the other arrays are left alone
    assert!(arrays.array(1).iter().all(|rec| rec.jx()[0] == 2.0));
    assert!(arrays.array(2).iter().all(|rec| rec.jz()[3] == 3.0));
}

#[test]
fn random_layouts() {
    init_logging();
    let cases = [
        // (n, n_array, s_array, block_len, n_pipeline)
        (1, 2, 1, 32, 1),
        (31, 2, 31, 32, 2),
        (33, 5, 40, 32, 2),
        (100, 11, 107, 8, 3),
        (257, 4, 300, 16, 4),
        (1000, 7, 1003, 32, 5),
        (64, 3, 64, 4096, 2),
    ];
    for (seed, &(n, n_array, s_array, block_len, n_pipeline)) in cases.iter().enumerate() {
        let orig = random_arrays(seed as u64 + 10, n, n_array, s_array, 100.0);
        for transfer in [TransferMode::Immediate, TransferMode::Threaded] {
            let mut arrays = orig.clone();
            reduce(&mut arrays, &config(n_pipeline, transfer, block_len));
            check_result(&arrays, &orig);
        }
    }
}

#[test]
fn close_to_naive_sum() {
    // with positive values, the naive single precision sum is a decent
    // approximation of the result
    let orig = random_arrays(4, 200, 11, 200, 1.0)
        .data
        .iter()
        .map(|rec| {
            let mut rec = *rec;
            rec.fields.iter_mut().flatten().for_each(|v| *v = v.abs());
            rec
        })
        .collect::<Vec<_>>();
    let orig = OwnedArrays {
        n: 200,
        n_array: 11,
        s_array: 200,
        data: orig,
    };
    let mut arrays = orig.clone();
    reduce(&mut arrays, &config(2, TransferMode::Threaded, 32));
    for i in 0..orig.n {
        assert_record_ulps(arrays.get(0, i), &reference_single(&orig, i), 16);
    }
}

#[test]
fn small_contributions_are_kept() {
    init_logging();
    let tiny = 1.0_f32 / 33554432.0; // 2^-25
    let orig = arrays_from_fn(40, 11, 40, |r, _| if r == 0 { 1.0 } else { tiny });

    let naive = reference_single(&orig, 0);
    assert_eq!(naive, AccumulatorRecord::splat(1.0));

    let mut arrays = orig.clone();
    reduce(&mut arrays, &config(1, TransferMode::Immediate, 32));
    let expected = AccumulatorRecord::splat((1.0_f64 + 10.0 * tiny as f64) as f32);
    assert_ne!(expected, naive);
    for rec in arrays.array(0) {
        assert_eq!(*rec, expected);
    }
}

#[test]
fn independent_of_rank_count() {
    init_logging();
    let orig = random_arrays(77, 1000, 6, 1024, 1.0e4);
    let mut reference = orig.clone();
    reduce(&mut reference, &config(1, TransferMode::Immediate, 32));

    for n_pipeline in [2, 3, 4, 7, 31, 64] {
        for transfer in [TransferMode::Immediate, TransferMode::Threaded] {
            let mut arrays = orig.clone();
            reduce(&mut arrays, &config(n_pipeline, transfer, 32));
            assert_eq!(
                bits(&arrays.data),
                bits(&reference.data),
                "n_pipeline = {n_pipeline}, transfer = {transfer:?}"
            );
        }
    }
}

#[test]
fn repeated_runs_match() {
    let orig = random_arrays(5, 300, 4, 310, 1.0);
    let mut first = orig.clone();
    reduce(&mut first, &config(3, TransferMode::Threaded, 16));
    for _ in 0..4 {
        let mut again = orig.clone();
        reduce(&mut again, &config(3, TransferMode::Threaded, 16));
        assert_eq!(bits(&again.data), bits(&first.data));
    }
}

#[test]
fn multi_rank_reports() {
    init_logging();
    let orig = random_arrays(9, 128, 2, 128, 1.0);
    let mut arrays = orig.clone();
    let ctx = ReductionContext::with_block_len(128, 2, 128, 32).unwrap();

    let mut executor = RayonExecutor::new(NonZeroUsize::new(4).unwrap())
        .unwrap()
        .with_transfer(TransferMode::Threaded);
    let pack = ctx.view(&mut arrays.data).unwrap();
    let reports = executor.drive_reduce(pack, &ctx).unwrap();

    assert_eq!(reports.len(), 4);
    for (rank, report) in reports.iter().enumerate() {
        assert_eq!(report.range, (32 * rank)..(32 * (rank + 1)));
        assert_eq!(report.n_block, 1);
        assert_eq!(report.n_record, 32);
    }
    check_result(&arrays, &orig);
}

#[test]
fn more_ranks_than_blocks() {
    let orig = random_arrays(12, 70, 3, 70, 1.0);
    let mut arrays = orig.clone();
    let ctx = ReductionContext::with_block_len(70, 3, 70, 32).unwrap();

    let mut executor = SerialExecutor::new(NonZeroUsize::new(5).unwrap());
    let pack = ctx.view(&mut arrays.data).unwrap();
    let reports = executor.drive_reduce(pack, &ctx).unwrap();

    assert_eq!(reports.len(), 5);
    let n_record: usize = reports.iter().map(|r| r.n_record).sum();
    assert_eq!(n_record, 70);
    assert_eq!(reports.iter().filter(|r| r.range.is_empty()).count(), 2);
    // the last rank picks up the tail
    assert_eq!(reports[4].range, 64..70);
    check_result(&arrays, &orig);
}

#[test]
fn executors_with_timeouts() {
    init_logging();
    let orig = random_arrays(31, 200, 4, 205, 1.0);
    let ctx = ReductionContext::with_block_len(200, 4, 205, 16).unwrap();
    let timeout = Some(Duration::from_secs(10));

    let mut serial: Box<dyn Executor> = Box::new(
        SerialExecutor::new(NonZeroUsize::new(3).unwrap())
            .with_transfer(TransferMode::Threaded)
            .with_timeout(timeout),
    );
    let mut parallel: Box<dyn Executor> = Box::new(
        RayonExecutor::new(NonZeroUsize::new(3).unwrap())
            .unwrap()
            .with_transfer(TransferMode::Threaded)
            .with_timeout(timeout),
    );
    for executor in [&mut serial, &mut parallel] {
        let mut arrays = orig.clone();
        let pack = ctx.view(&mut arrays.data).unwrap();
        let reports = executor.drive_reduce(pack, &ctx).unwrap();
        assert_eq!(reports.iter().map(|r| r.n_record).sum::<usize>(), 200);
        check_result(&arrays, &orig);
    }
}

#[test]
fn nothing_to_reduce() {
    for n_array in [0, 1] {
        let orig = random_arrays(3, 50, n_array, 50, 1.0);
        let mut arrays = orig.clone();
        let ctx = ReductionContext::new(50, n_array, 50).unwrap();
        let reports =
            reduce_accumulators(&mut arrays.data, &ctx, &ReduceConfig::default()).unwrap();
        assert!(reports.is_empty());
        assert_eq!(bits(&arrays.data), bits(&orig.data));
    }
}

#[test]
fn too_many_arrays() {
    let err = ReductionContext::new(50, MAX_ARRAY + 1, 50).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn short_slice_is_rejected() {
    let orig = random_arrays(3, 50, 3, 50, 1.0);
    let mut data = orig.data[..149].to_vec();
    let ctx = ReductionContext::new(50, 3, 50).unwrap();
    let err = reduce_accumulators(&mut data, &ctx, &ReduceConfig::default()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(bits(&data), bits(&orig.data[..149]));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn matches_reference_for_any_shape(
        n in 1usize..300,
        n_array in 2usize..=MAX_ARRAY,
        pad in 0usize..5,
        block_len in 1usize..70,
        n_pipeline in 1usize..6,
        threaded: bool,
        seed: u64,
    ) {
        let orig = random_arrays(seed, n, n_array, n + pad, 1.0e3);
        let transfer = if threaded {
            TransferMode::Threaded
        } else {
            TransferMode::Immediate
        };
        let mut arrays = orig.clone();
        reduce(&mut arrays, &config(n_pipeline, transfer, block_len));
        check_result(&arrays, &orig);
    }
}
