//! Multi-rank [`Concurrency`] simulated inside one process.

use std::sync::atomic::{AtomicUsize, Ordering};

use dca_core::Concurrency;

/// Plays rank `id` of `ranks`, pretending every other rank reports the
/// same values: `sum` multiplies by the rank count.
#[derive(Debug)]
pub struct MirroredRanks {
    id: usize,
    ranks: usize,
    reductions: AtomicUsize,
}

impl MirroredRanks {
    pub fn new(id: usize, ranks: usize) -> Self {
        assert!(id < ranks, "rank {id} out of {ranks}");
        Self {
            id,
            ranks,
            reductions: AtomicUsize::new(0),
        }
    }

    /// Number of `sum` calls so far.
    pub fn reductions(&self) -> usize {
        self.reductions.load(Ordering::SeqCst)
    }
}

impl Concurrency for MirroredRanks {
    fn id(&self) -> usize {
        self.id
    }

    fn number_of_processors(&self) -> usize {
        self.ranks
    }

    fn sum(&self, values: &mut [f64]) {
        self.reductions.fetch_add(1, Ordering::SeqCst);
        for v in values {
            *v *= self.ranks as f64;
        }
    }
}
