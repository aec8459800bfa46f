//! Threaded QMC cluster-solver integration engine.
//!
//! [`ThreadedQmciSolver`] coordinates `W` walkers (Markov-chain samplers)
//! and `A` accumulators (measurement aggregators) on a worker pool. Idle
//! walkers and idle accumulators meet in a rendezvous; each pairing yields
//! one measurement. An accumulator that meets its quota merges into the
//! shared statistics exactly once and retires. When the last one retires,
//! the completion signal releases the caller of
//! [`integrate()`](ThreadedQmciSolver::integrate).
//!
//! # Architecture
//!
//! ```text
//!   integrate() ──► submit A × AccumulatorInit, W × WalkerInit
//!        │
//!        │            ┌───────────── pool workers ─────────────┐
//!        │            │  Stage ─► Stage ─► ... (task graph)    │
//!        │            │     │            ▲                     │
//!        │            │     ▼            │                     │
//!        │            │  Rendezvous (walker queue | acc queue) │
//!        │            │     │                                  │
//!        │            │     ▼                                  │
//!        │            │  merge lock ─► shared statistics       │
//!        │            └──────────────┬─────────────────────────┘
//!        ▼                           │
//!   CompletionSignal::wait() ◄───────┘ last accumulator retires
//! ```
//!
//! The execution backend is a type parameter: [`NativeQmciSolver`] runs on
//! [`WorkerPool`](dca_parallel::WorkerPool), [`TaskQmciSolver`] on
//! [`TaskPool`](dca_parallel::TaskPool).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod report;
pub mod seeding;
pub mod signal;
pub mod slots;
pub mod thread_task_handler;

mod rendezvous;
mod stages;

pub use config::{measurement_quotas, ConfigError, SolverConfig};
pub use engine::{NativeQmciSolver, Prober, TaskQmciSolver, ThreadedQmciSolver};
pub use error::SolverError;
pub use rendezvous::QueueDepths;
pub use report::{
    AccumulatorSummary, DcaLoopInfo, IntegrationReport, IterationSummary, Probe, WalkerSummary,
};
pub use signal::CompletionSignal;
pub use slots::{Census, Phase};
pub use thread_task_handler::{Role, ThreadTaskHandler};
