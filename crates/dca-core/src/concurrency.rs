//! Rank-level concurrency collaborator.
//!
//! The engine never talks to a message-passing layer directly. It asks a
//! [`Concurrency`] for its rank id, reduces scalars through it, and uses
//! its bounds splitting to find this rank's share of the measurements.
//! [`SerialConcurrency`] is the single-rank implementation.

use std::ops::Range;

/// Split `range` into `parts` contiguous chunks and return chunk `index`.
///
/// The first `len % parts` chunks are one element longer than the rest,
/// so chunk lengths differ by at most one and their sum is `len`.
///
/// # Panics
///
/// Panics if `parts == 0` or `index >= parts`.
pub fn split_range(range: Range<usize>, parts: usize, index: usize) -> Range<usize> {
    assert!(parts > 0, "cannot split a range into zero parts");
    assert!(index < parts, "chunk index {index} out of {parts} parts");
    let len = range.end.saturating_sub(range.start);
    let base = len / parts;
    let extra = len % parts;
    let start = range.start + index * base + index.min(extra);
    let chunk = base + usize::from(index < extra);
    start..start + chunk
}

/// Rank id, reduction and bounds splitting across processes.
pub trait Concurrency: Send + Sync {
    /// This rank's id in `0..number_of_processors()`.
    fn id(&self) -> usize;

    /// Total number of ranks.
    fn number_of_processors(&self) -> usize;

    /// Id of the rank that reports progress.
    fn first(&self) -> usize {
        0
    }

    /// Id of the last rank.
    fn last(&self) -> usize {
        self.number_of_processors().saturating_sub(1)
    }

    /// `true` on the reporting rank.
    fn is_first(&self) -> bool {
        self.id() == self.first()
    }

    /// Element-wise sum of `values` over all ranks, written back in place.
    fn sum(&self, values: &mut [f64]);

    /// This rank's share of `range`.
    fn bounds(&self, range: Range<usize>) -> Range<usize> {
        split_range(range, self.number_of_processors().max(1), self.id())
    }
}

/// Single-process [`Concurrency`]: rank 0 of 1, reductions are identities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SerialConcurrency;

impl Concurrency for SerialConcurrency {
    fn id(&self) -> usize {
        0
    }

    fn number_of_processors(&self) -> usize {
        1
    }

    fn sum(&self, _values: &mut [f64]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn serial_owns_everything() {
        let c = SerialConcurrency;
        assert_eq!(c.bounds(0..10), 0..10);
        assert!(c.is_first());
        assert_eq!(c.last(), 0);
        let mut v = [1.5, 2.0];
        c.sum(&mut v);
        assert_eq!(v, [1.5, 2.0]);
    }

    #[test]
    fn remainder_goes_to_leading_chunks() {
        assert_eq!(split_range(0..10, 3, 0), 0..4);
        assert_eq!(split_range(0..10, 3, 1), 4..7);
        assert_eq!(split_range(0..10, 3, 2), 7..10);
    }

    #[test]
    fn more_parts_than_elements() {
        assert_eq!(split_range(0..1, 3, 0), 0..1);
        assert_eq!(split_range(0..1, 3, 1), 1..1);
        assert_eq!(split_range(0..1, 3, 2), 1..1);
    }

    #[test]
    #[should_panic]
    fn zero_parts_panics() {
        let _ = split_range(0..4, 0, 0);
    }

    proptest! {
        #[test]
        fn chunks_tile_the_range(start in 0usize..100, len in 0usize..500, parts in 1usize..32) {
            let range = start..start + len;
            let mut cursor = start;
            let mut min_len = usize::MAX;
            let mut max_len = 0;
            for i in 0..parts {
                let chunk = split_range(range.clone(), parts, i);
                prop_assert_eq!(chunk.start, cursor);
                cursor = chunk.end;
                min_len = min_len.min(chunk.len());
                max_len = max_len.max(chunk.len());
            }
            prop_assert_eq!(cursor, range.end);
            prop_assert!(max_len - min_len <= 1);
        }
    }
}
