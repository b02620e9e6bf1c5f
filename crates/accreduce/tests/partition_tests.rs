use accreduce::{MAX_BLOCK_LEN, block_ranges, distribute};
use proptest::prelude::*;

proptest! {
    #[test]
    fn ranks_tile_the_records(
        n in 0usize..100_000,
        block_len in 1usize..=MAX_BLOCK_LEN,
        n_rank in 1usize..200,
    ) {
        let mut expected_start = 0;
        for rank in 0..n_rank {
            let range = distribute(n, block_len, rank, n_rank);
            prop_assert_eq!(range.start, expected_start);
            prop_assert!(range.start <= range.end);
            prop_assert_eq!(range.start % block_len, 0);
            if rank + 1 < n_rank {
                prop_assert_eq!(range.len() % block_len, 0);
            }
            expected_start = range.end;
        }
        prop_assert_eq!(expected_start, n);
    }

    #[test]
    fn ranks_are_balanced(
        n in 0usize..100_000,
        block_len in 1usize..=256,
        n_rank in 1usize..64,
    ) {
        // excluding the tail, the number of whole blocks per rank differs by
        // at most one
        let n_blocks: Vec<usize> = (0..n_rank)
            .map(|rank| distribute(n, block_len, rank, n_rank).len() / block_len)
            .collect();
        let max = n_blocks.iter().copied().max().unwrap();
        let min = n_blocks.iter().copied().min().unwrap();
        prop_assert!(max - min <= 1);
    }

    #[test]
    fn blocks_tile_a_range(
        start_block in 0usize..1000,
        len in 0usize..10_000,
        block_len in 1usize..512,
    ) {
        let start = start_block * block_len;
        let blocks = block_ranges(start..(start + len), block_len);
        prop_assert_eq!(blocks.len(), len.div_ceil(block_len));

        let mut expected_start = start;
        for block in blocks {
            prop_assert_eq!(block.start, expected_start);
            prop_assert!(!block.is_empty() && block.len() <= block_len);
            expected_start = block.end;
        }
        prop_assert_eq!(expected_start, start + len);
    }
}
