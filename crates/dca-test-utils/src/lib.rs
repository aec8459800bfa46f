//! Test utilities and mock types for DCA++ solver development.
//!
//! Provides a [`MockKernel`] whose walkers, accumulators and statistics
//! report every call into a shared [`Ledger`], a [`FailurePlan`] for
//! injecting kernel errors and panics at chosen points, a [`MemoryWriter`]
//! that keeps written values in insertion order, and [`MirroredRanks`] for
//! exercising multi-rank reductions in one process.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod kernel;
pub mod ranks;
pub mod writer;

pub use kernel::{
    FailurePlan, Ledger, MockAccumulator, MockKernel, MockStatistics, MockWalker,
};
pub use ranks::MirroredRanks;
pub use writer::{Entry, MemoryWriter};
