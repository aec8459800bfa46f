//! Capability traits the integration engine is written against.
//!
//! The engine schedules work; it never looks inside a sweep or a
//! measurement. Everything physics-specific is reached through these
//! traits:
//!
//! - [`Walker`]: one Markov chain. Sweeps with a generator it is handed.
//! - [`Accumulator`]: measures walker configurations and merges its
//!   statistics into the shared [`Statistics`].
//! - [`QmcKernel`]: factory and finalizer tying the three together.

use rand::{RngCore, SeedableRng};

use crate::concurrency::Concurrency;
use crate::error::{KernelError, WriteError};
use crate::id::{AccumulatorId, WalkerId};
use crate::writer::Writer;

/// A Markov-chain sampler.
///
/// The walker does not own its random number generator. The engine keeps
/// one generator per walker slot and lends it to every call that needs
/// randomness, so the stream survives across DCA iterations while the
/// walker itself is rebuilt.
pub trait Walker: Send + 'static {
    /// Generator type lent to the walker.
    type Rng: RngCore + Send + 'static;

    /// Prepare the initial configuration.
    fn initialize(&mut self, rng: &mut Self::Rng) -> Result<(), KernelError>;

    /// Perform one sweep of Markov-chain updates.
    fn do_sweep(&mut self, rng: &mut Self::Rng) -> Result<(), KernelError>;

    /// Progress hook: `done` out of `total` steps of the current phase.
    fn update_shell(&mut self, _done: usize, _total: usize) {}
}

/// Merge target for accumulated measurements.
pub trait Statistics: Send + 'static {
    /// Normalise accumulated sums once integration has ended.
    fn finalize(&mut self);

    /// Number of measurements merged so far.
    fn number_of_measurements(&self) -> usize;
}

/// A measurement aggregator.
pub trait Accumulator: Send + 'static {
    /// Walker type whose configurations this accumulator measures.
    type Walker: Walker;
    /// Shared result this accumulator merges into.
    type Statistics: Statistics;

    /// Reset buffers for a new DCA iteration.
    fn initialize(&mut self, dca_iteration: usize) -> Result<(), KernelError>;

    /// Copy the walker's current configuration for the next measurement.
    fn update_from(&mut self, walker: &Self::Walker) -> Result<(), KernelError>;

    /// Measure the configuration taken by the last `update_from`.
    fn measure(&mut self) -> Result<(), KernelError>;

    /// Add this accumulator's statistics into `target`.
    fn sum_to(&self, target: &mut Self::Statistics) -> Result<(), KernelError>;

    /// Number of measurements taken since `initialize`.
    fn number_of_measurements(&self) -> usize;
}

/// Shorthand for the statistics type of a kernel.
pub type StatisticsOf<K> = <<K as QmcKernel>::Accumulator as Accumulator>::Statistics;

/// The physics layer of a QMC cluster solver.
///
/// Shared by reference between all worker tasks, hence `Sync` and `&self`
/// everywhere.
pub trait QmcKernel: Send + Sync + 'static {
    /// Generator type; one seeded instance per walker slot.
    type Rng: RngCore + SeedableRng + Send + 'static;
    /// Walker type.
    type Walker: Walker<Rng = Self::Rng>;
    /// Accumulator type.
    type Accumulator: Accumulator<Walker = Self::Walker>;

    /// Prime per-iteration parameters.
    fn initialize(&self, _dca_iteration: usize) -> Result<(), KernelError> {
        Ok(())
    }

    /// Build a walker. The generator is lent for any randomised setup.
    fn new_walker(&self, id: WalkerId, rng: &mut Self::Rng) -> Result<Self::Walker, KernelError>;

    /// Build an accumulator.
    fn new_accumulator(&self, id: AccumulatorId) -> Result<Self::Accumulator, KernelError>;

    /// Build an empty merge target.
    fn new_statistics(&self) -> StatisticsOf<Self>;

    /// Compute error bars from the merged statistics.
    fn compute_error_bars(
        &self,
        _statistics: &StatisticsOf<Self>,
        _concurrency: &dyn Concurrency,
    ) -> Result<(), KernelError> {
        Ok(())
    }

    /// Turn the merged statistics into the next self-energy and return the
    /// L2 difference to the previous one.
    fn finalize(
        &self,
        statistics: &mut StatisticsOf<Self>,
        dca_iteration: usize,
    ) -> Result<f64, KernelError>;

    /// Write physics output.
    fn write(
        &self,
        _statistics: &StatisticsOf<Self>,
        _writer: &mut dyn Writer,
    ) -> Result<(), WriteError> {
        Ok(())
    }
}
