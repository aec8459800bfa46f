//! Solver configuration, validation, and error types.
//!
//! [`SolverConfig`] carries the counts the integration loop is driven by.
//! [`validate()`](SolverConfig::validate) rejects unusable values before
//! any thread is spawned; the solver constructor calls it.

use std::error::Error;
use std::fmt;

use dca_core::{split_range, Concurrency};
use dca_parallel::{PoolConfig, PoolError};

// ── SolverConfig ──────────────────────────────────────────────────

/// Parameters of the threaded QMC integration.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Number of concurrent walkers. Must be at least 1.
    pub walkers: usize,
    /// Number of concurrent accumulators. Must be at least 1.
    pub accumulators: usize,
    /// Total measurements per DCA iteration, summed over all ranks.
    pub measurements: usize,
    /// Sweeps each walker discards before it is measured.
    pub warm_up_sweeps: usize,
    /// Base seed for the per-walker generators.
    pub seed: u64,
    /// Number of DCA iterations. Error bars are computed on the last.
    pub dca_iterations: usize,
    /// Worker pool settings. The pool is enlarged to at least
    /// `walkers + accumulators` workers.
    pub pool: PoolConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            walkers: 1,
            accumulators: 1,
            measurements: 100,
            warm_up_sweeps: 20,
            seed: 42,
            dca_iterations: 1,
            pool: PoolConfig {
                stack_size: Some(dca_parallel::config::LARGE_STACK_SIZE),
                ..PoolConfig::default()
            },
        }
    }
}

impl SolverConfig {
    /// Check every structural requirement of the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.walkers == 0 {
            return Err(ConfigError::NoWalkers);
        }
        if self.accumulators == 0 {
            return Err(ConfigError::NoAccumulators);
        }
        if self.measurements == 0 {
            return Err(ConfigError::NoMeasurements);
        }
        if self.dca_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        self.pool.validate()?;
        Ok(())
    }

    /// Measurements this rank performs.
    pub fn rank_measurements(&self, concurrency: &dyn Concurrency) -> usize {
        concurrency.bounds(0..self.measurements).len()
    }

    /// Number of pool workers the solver needs: the configured count, but
    /// never fewer than one per walker and accumulator.
    pub fn worker_count(&self) -> usize {
        self.pool
            .resolved_worker_count()
            .max(self.walkers + self.accumulators)
    }
}

/// Split `rank_total` measurements over `accumulators`.
///
/// The first `rank_total % accumulators` accumulators take one extra
/// measurement. Quotas sum to `rank_total`; an accumulator may get zero.
pub fn measurement_quotas(rank_total: usize, accumulators: usize) -> Vec<usize> {
    (0..accumulators)
        .map(|i| split_range(0..rank_total, accumulators, i).len())
        .collect()
}

// ── ConfigError ───────────────────────────────────────────────────

/// Errors detected while validating a [`SolverConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `walkers` is zero.
    NoWalkers,
    /// `accumulators` is zero.
    NoAccumulators,
    /// `measurements` is zero.
    NoMeasurements,
    /// `dca_iterations` is zero.
    ZeroIterations,
    /// The pool configuration was rejected.
    Pool(PoolError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWalkers => write!(f, "at least one walker is required"),
            Self::NoAccumulators => write!(f, "at least one accumulator is required"),
            Self::NoMeasurements => write!(f, "measurement count must be positive"),
            Self::ZeroIterations => write!(f, "at least one DCA iteration is required"),
            Self::Pool(e) => write!(f, "pool: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pool(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PoolError> for ConfigError {
    fn from(e: PoolError) -> Self {
        Self::Pool(e)
    }
}
