//! Benchmark profiles for the threaded QMC solver.
//!
//! Provides pre-built [`SolverConfig`] profiles for benchmarking:
//!
//! - [`reference_profile`]: 4 walkers, 4 accumulators, 10K measurements
//! - [`stress_profile`]: 16 walkers, 8 accumulators, 100K measurements
//! - [`walker_heavy_profile`]: many walkers feeding one accumulator

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use dca_parallel::PoolConfig;
use dca_solver::SolverConfig;

/// Build a reference profile: 4 walkers, 4 accumulators, 10K
/// measurements, 10 warm-up sweeps.
pub fn reference_profile(seed: u64) -> SolverConfig {
    profile(4, 4, 10_000, 10, seed)
}

/// Build a stress profile: 16 walkers, 8 accumulators, 100K
/// measurements.
///
/// Same shape as [`reference_profile`] at 10x the measurement count.
pub fn stress_profile(seed: u64) -> SolverConfig {
    profile(16, 8, 100_000, 10, seed)
}

/// Build a profile where `walkers` walkers compete for a single
/// accumulator, so the walker queue stays populated.
pub fn walker_heavy_profile(walkers: usize, seed: u64) -> SolverConfig {
    profile(walkers, 1, 10_000, 1, seed)
}

fn profile(
    walkers: usize,
    accumulators: usize,
    measurements: usize,
    warm_up_sweeps: usize,
    seed: u64,
) -> SolverConfig {
    SolverConfig {
        walkers,
        accumulators,
        measurements,
        warm_up_sweeps,
        seed,
        dca_iterations: 1,
        pool: PoolConfig::large_stack(walkers + accumulators),
    }
}
