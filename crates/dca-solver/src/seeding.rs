//! Per-walker generator seeding.
//!
//! Every generator slot on every rank gets its own stream id,
//! `rng_index * ranks + rank`, which is mixed with the base seed. Distinct
//! stream ids always map to distinct seeds because both mixing steps are
//! bijections on `u64`.

use rand::SeedableRng;

use dca_core::RngIndex;

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Seed for generator slot `rng_index` on rank `rank` of `ranks`.
pub fn walker_seed(base: u64, rank: usize, ranks: usize, rng_index: RngIndex) -> u64 {
    let stream = (rng_index.0 as u64)
        .wrapping_mul(ranks.max(1) as u64)
        .wrapping_add(rank as u64);
    splitmix64(base ^ splitmix64(stream))
}

/// Build one generator per walker slot.
pub fn seed_generators<R: SeedableRng>(
    base: u64,
    rank: usize,
    ranks: usize,
    count: usize,
) -> Vec<R> {
    (0..count)
        .map(|i| {
            let seed = walker_seed(base, rank, ranks, RngIndex(i));
            tracing::trace!(rank, rng = i, seed, "walker generator seeded");
            R::seed_from_u64(seed)
        })
        .collect()
}
