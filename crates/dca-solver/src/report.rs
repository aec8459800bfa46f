//! What an integration and the DCA loop leave behind.

use std::time::Duration;

use dca_core::{AccumulatorId, RngIndex, WalkerId};

use crate::rendezvous::QueueDepths;
use crate::slots::{Census, Phase};

/// Per-accumulator outcome of one `integrate()` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccumulatorSummary {
    /// Accumulator id.
    pub id: AccumulatorId,
    /// Measurements assigned to it.
    pub quota: usize,
    /// Measurements it performed.
    pub measurements: usize,
    /// Times its statistics were merged into the shared result.
    pub merges: usize,
}

/// Per-walker outcome of one `integrate()` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkerSummary {
    /// Walker id.
    pub id: WalkerId,
    /// Generator slot the walker drew from.
    pub rng_index: RngIndex,
    /// Sweeps done during warm-up.
    pub warm_up_sweeps: usize,
    /// Sweeps done after warm-up.
    pub sweeps: usize,
    /// Measurements taken of this walker's configurations.
    pub measured: usize,
    /// Whether warm-up completed.
    pub thermalized: bool,
    /// Where the walker ended up.
    pub phase: Phase,
}

/// Result of a successful `integrate()` call.
#[derive(Clone, Debug)]
pub struct IntegrationReport {
    /// DCA iteration this integration belonged to.
    pub dca_iteration: usize,
    /// Measurements this rank was asked for.
    pub target: usize,
    /// Measurements performed, summed over accumulators.
    pub measurements: usize,
    /// Wall time from submission to the completion signal.
    pub elapsed: Duration,
    /// Successful fires of the completion signal.
    pub completion_fires: usize,
    /// Walker slots at the end of the run.
    pub walker_census: Census,
    /// Accumulator slots at the end of the run.
    pub accumulator_census: Census,
    /// One entry per walker, in id order.
    pub walkers: Vec<WalkerSummary>,
    /// One entry per accumulator, in id order.
    pub accumulators: Vec<AccumulatorSummary>,
}

impl IntegrationReport {
    /// Merges summed over accumulators.
    pub fn total_merges(&self) -> usize {
        self.accumulators.iter().map(|a| a.merges).sum()
    }

    /// Sweeps after warm-up, summed over walkers.
    pub fn total_sweeps(&self) -> usize {
        self.walkers.iter().map(|w| w.sweeps).sum()
    }
}

/// A consistent view of the scheduler, taken while integration runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Probe {
    /// Rendezvous queue depths.
    pub queues: QueueDepths,
    /// Walker slots.
    pub walkers: Census,
    /// Accumulator slots.
    pub accumulators: Census,
    /// Tasks submitted but not finished.
    pub in_flight: usize,
}

/// Outcome of one DCA iteration, recorded by `finalize`.
#[derive(Clone, Debug, PartialEq)]
pub struct IterationSummary {
    /// DCA iteration index.
    pub dca_iteration: usize,
    /// L2 difference between successive self-energies.
    pub l2_difference: f64,
    /// Measurements over all ranks.
    pub measurements: usize,
    /// Integration wall time summed over all ranks.
    pub qmc_time: Duration,
    /// Whether error bars were computed.
    pub error_bars: bool,
}

/// History of the outer DCA loop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DcaLoopInfo {
    iterations: Vec<IterationSummary>,
}

impl DcaLoopInfo {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an iteration.
    pub fn record(&mut self, summary: IterationSummary) {
        self.iterations.push(summary);
    }

    /// Recorded iterations, oldest first.
    pub fn iterations(&self) -> &[IterationSummary] {
        &self.iterations
    }

    /// The most recent iteration.
    pub fn last(&self) -> Option<&IterationSummary> {
        self.iterations.last()
    }

    /// Number of recorded iterations.
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    /// `true` before the first `finalize`.
    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }
}
