//! Core types and traits for the DCA++ QMC cluster solver.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the abstractions the threaded integration engine is written against:
//! typed ids, the walker / accumulator / kernel capability traits, the
//! rank-level [`Concurrency`] collaborator, the [`Writer`] sink, and the
//! error types those collaborators report.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod concurrency;
pub mod error;
pub mod id;
pub mod traits;
pub mod writer;

pub use concurrency::{split_range, Concurrency, SerialConcurrency};
pub use error::{KernelError, WriteError};
pub use id::{AccumulatorId, LogicalThreadId, RngIndex, WalkerId};
pub use traits::{Accumulator, QmcKernel, Statistics, StatisticsOf, Walker};
pub use writer::{Value, Writer};
