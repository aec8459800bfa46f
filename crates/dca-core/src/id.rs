//! Strongly-typed identifiers for walkers, accumulators and RNG slots.

use std::fmt;

/// Identifies a walker within one rank.
///
/// Walker ids are dense: `WalkerId(n)` is the n-th walker, `0..walkers`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalkerId(pub usize);

impl fmt::Display for WalkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "walker-{}", self.0)
    }
}

impl From<usize> for WalkerId {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Identifies an accumulator within one rank.
///
/// Accumulator ids are dense: `AccumulatorId(n)` is the n-th accumulator,
/// `0..accumulators`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccumulatorId(pub usize);

impl fmt::Display for AccumulatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "accumulator-{}", self.0)
    }
}

impl From<usize> for AccumulatorId {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Index of a random number generator slot.
///
/// Every walker owns exactly one generator slot for the lifetime of the
/// solver; slots are never shared between walkers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RngIndex(pub usize);

impl fmt::Display for RngIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical thread id in the thread-task table.
///
/// Walkers and accumulators share one id space `0..walkers + accumulators`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalThreadId(pub usize);

impl fmt::Display for LogicalThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
