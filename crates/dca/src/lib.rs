//! DCA++ threaded QMC cluster-solver integration engine.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the DCA sub-crates. For most users, adding `dca` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use dca::prelude::*;
//! use rand::RngCore;
//! use rand_chacha::ChaCha8Rng;
//!
//! // A walker whose configuration is one coin flip per sweep.
//! struct Coin {
//!     heads: bool,
//! }
//!
//! impl Walker for Coin {
//!     type Rng = ChaCha8Rng;
//!     fn initialize(&mut self, rng: &mut ChaCha8Rng) -> Result<(), KernelError> {
//!         self.heads = rng.next_u32() & 1 == 1;
//!         Ok(())
//!     }
//!     fn do_sweep(&mut self, rng: &mut ChaCha8Rng) -> Result<(), KernelError> {
//!         self.heads = rng.next_u32() & 1 == 1;
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Tally {
//!     heads: usize,
//!     total: usize,
//! }
//!
//! impl Statistics for Tally {
//!     fn finalize(&mut self) {}
//!     fn number_of_measurements(&self) -> usize {
//!         self.total
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Counter {
//!     last: bool,
//!     tally: Tally,
//! }
//!
//! impl Accumulator for Counter {
//!     type Walker = Coin;
//!     type Statistics = Tally;
//!     fn initialize(&mut self, _dca_iteration: usize) -> Result<(), KernelError> {
//!         self.tally = Tally::default();
//!         Ok(())
//!     }
//!     fn update_from(&mut self, walker: &Coin) -> Result<(), KernelError> {
//!         self.last = walker.heads;
//!         Ok(())
//!     }
//!     fn measure(&mut self) -> Result<(), KernelError> {
//!         self.tally.heads += usize::from(self.last);
//!         self.tally.total += 1;
//!         Ok(())
//!     }
//!     fn sum_to(&self, target: &mut Tally) -> Result<(), KernelError> {
//!         target.heads += self.tally.heads;
//!         target.total += self.tally.total;
//!         Ok(())
//!     }
//!     fn number_of_measurements(&self) -> usize {
//!         self.tally.total
//!     }
//! }
//!
//! struct CoinKernel;
//!
//! impl QmcKernel for CoinKernel {
//!     type Rng = ChaCha8Rng;
//!     type Walker = Coin;
//!     type Accumulator = Counter;
//!     fn new_walker(&self, _id: WalkerId, _rng: &mut ChaCha8Rng) -> Result<Coin, KernelError> {
//!         Ok(Coin { heads: false })
//!     }
//!     fn new_accumulator(&self, _id: AccumulatorId) -> Result<Counter, KernelError> {
//!         Ok(Counter::default())
//!     }
//!     fn new_statistics(&self) -> Tally {
//!         Tally::default()
//!     }
//!     fn finalize(&self, stats: &mut Tally, _dca_iteration: usize) -> Result<f64, KernelError> {
//!         Ok((stats.heads as f64 / stats.total as f64 - 0.5).abs())
//!     }
//! }
//!
//! let config = SolverConfig {
//!     walkers: 2,
//!     accumulators: 2,
//!     measurements: 1000,
//!     ..SolverConfig::default()
//! };
//! let mut solver = NativeQmciSolver::new(config, CoinKernel, SerialConcurrency)?;
//! let mut info = DcaLoopInfo::new();
//!
//! solver.initialize(0)?;
//! let report = solver.integrate()?;
//! assert_eq!(report.measurements, 1000);
//! assert!(solver.finalize(&mut info)? < 0.5);
//! # Ok::<(), SolverError>(())
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `dca-core` | IDs, kernel traits, `Concurrency`, `Writer`, kernel errors |
//! | [`parallel`] | `dca-parallel` | Worker-pool backends, task handles, `Threading` |
//! | [`solver`] | `dca-solver` | `ThreadedQmciSolver`, configuration, reports |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`dca-core`).
///
/// Contains the kernel capability traits ([`types::Walker`],
/// [`types::Accumulator`], [`types::QmcKernel`]) and the rank-level
/// [`types::Concurrency`] collaborator.
pub use dca_core as types;

/// Execution backends (`dca-parallel`).
///
/// [`parallel::WorkerPool`] runs jobs on native threads with per-worker
/// queues, [`parallel::TaskPool`] on a shared injector. Both implement
/// [`parallel::Executor`].
pub use dca_parallel as parallel;

/// The integration engine (`dca-solver`).
///
/// [`solver::ThreadedQmciSolver`] and its backend aliases
/// [`solver::NativeQmciSolver`] and [`solver::TaskQmciSolver`].
pub use dca_solver as solver;

/// Common imports for typical solver usage.
///
/// ```rust
/// use dca::prelude::*;
/// ```
pub mod prelude {
    // Kernel traits and ids
    pub use dca_core::{
        Accumulator, AccumulatorId, Concurrency, QmcKernel, SerialConcurrency, Statistics,
        StatisticsOf, Value, Walker, WalkerId, Writer,
    };

    // Errors
    pub use dca_core::{KernelError, WriteError};
    pub use dca_parallel::PoolError;
    pub use dca_solver::{ConfigError, SolverError};

    // Backends
    pub use dca_parallel::{Executor, PoolConfig, TaskPool, WorkerPool};

    // Engine
    pub use dca_solver::{
        DcaLoopInfo, IntegrationReport, NativeQmciSolver, SolverConfig, TaskQmciSolver,
        ThreadedQmciSolver,
    };
}
