//! Instrumented mock kernel.
//!
//! A walker's configuration is a single random `u64`; a measurement adds
//! it, scaled to `[0, 1)`, into the accumulator's running sum. Everything
//! observable (sweeps, measurements, merges per accumulator, shell
//! updates) is counted in a [`Ledger`] shared by all mocks built from the
//! same [`MockKernel`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rand::RngCore;
use rand_chacha::ChaCha8Rng;

use dca_core::{
    Accumulator, AccumulatorId, Concurrency, KernelError, QmcKernel, Statistics, Value, Walker,
    WalkerId, WriteError, Writer,
};

/// Where to fail. Counts are 1-based over the whole ledger.
#[derive(Clone, Debug, Default)]
pub struct FailurePlan {
    /// Return an error from the n-th `do_sweep` call.
    pub fail_sweep_at: Option<usize>,
    /// Return an error from the n-th `measure` call.
    pub fail_measure_at: Option<usize>,
    /// Panic inside the n-th `measure` call.
    pub panic_measure_at: Option<usize>,
    /// Refuse to build this walker.
    pub fail_walker: Option<WalkerId>,
    /// Refuse to merge this accumulator.
    pub fail_merge: Option<AccumulatorId>,
    /// This accumulator reports one measurement more than it took.
    pub overcount: Option<AccumulatorId>,
    /// This accumulator merges its sums but not its measurement count.
    pub drop_count_on_merge: Option<AccumulatorId>,
}

/// Shared call counters.
#[derive(Debug, Default)]
pub struct Ledger {
    pub walkers_built: AtomicUsize,
    pub accumulators_built: AtomicUsize,
    pub sweeps: AtomicUsize,
    pub measurements: AtomicUsize,
    pub shell_updates: AtomicUsize,
    pub error_bars: AtomicUsize,
    pub finalizations: AtomicUsize,
    /// Smallest walker sweep count seen by `update_from`.
    pub min_sweeps_at_measurement: AtomicUsize,
    /// Merge calls per accumulator id.
    pub merges: Mutex<Vec<usize>>,
    /// Iterations passed to `QmcKernel::initialize`.
    pub kernel_iterations: Mutex<Vec<usize>>,
    /// Iterations passed to `Accumulator::initialize`.
    pub accumulator_iterations: Mutex<Vec<usize>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            min_sweeps_at_measurement: AtomicUsize::new(usize::MAX),
            ..Self::default()
        }
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps.load(Ordering::SeqCst)
    }

    pub fn measurements(&self) -> usize {
        self.measurements.load(Ordering::SeqCst)
    }

    /// Merge calls per accumulator id.
    pub fn merges(&self) -> Vec<usize> {
        self.merges.lock().unwrap().clone()
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.walkers_built,
            &self.accumulators_built,
            &self.sweeps,
            &self.measurements,
            &self.shell_updates,
            &self.error_bars,
            &self.finalizations,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
        self.min_sweeps_at_measurement
            .store(usize::MAX, Ordering::SeqCst);
        self.merges.lock().unwrap().clear();
        self.kernel_iterations.lock().unwrap().clear();
        self.accumulator_iterations.lock().unwrap().clear();
    }
}

// ── Walker ────────────────────────────────────────────────────────

pub struct MockWalker {
    pub id: WalkerId,
    pub sweeps: usize,
    pub state: u64,
    ledger: Arc<Ledger>,
    plan: Arc<FailurePlan>,
}

impl Walker for MockWalker {
    type Rng = ChaCha8Rng;

    fn initialize(&mut self, rng: &mut ChaCha8Rng) -> Result<(), KernelError> {
        self.state = rng.next_u64();
        Ok(())
    }

    fn do_sweep(&mut self, rng: &mut ChaCha8Rng) -> Result<(), KernelError> {
        let n = self.ledger.sweeps.fetch_add(1, Ordering::SeqCst) + 1;
        if self.plan.fail_sweep_at == Some(n) {
            return Err(KernelError::failed(format!("sweep {n} rejected")));
        }
        self.sweeps += 1;
        self.state = rng.next_u64();
        Ok(())
    }

    fn update_shell(&mut self, _done: usize, _total: usize) {
        self.ledger.shell_updates.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Statistics ────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MockStatistics {
    pub measurements: usize,
    pub sum: f64,
    pub contributions: usize,
    pub mean: Option<f64>,
    pub error_bars: bool,
}

impl Statistics for MockStatistics {
    fn finalize(&mut self) {
        if self.measurements > 0 {
            self.mean = Some(self.sum / self.measurements as f64);
        }
    }

    fn number_of_measurements(&self) -> usize {
        self.measurements
    }
}

// ── Accumulator ───────────────────────────────────────────────────

pub struct MockAccumulator {
    pub id: AccumulatorId,
    pub measurements: usize,
    pub sum: f64,
    pub iteration: Option<usize>,
    current: Option<u64>,
    ledger: Arc<Ledger>,
    plan: Arc<FailurePlan>,
}

impl Accumulator for MockAccumulator {
    type Walker = MockWalker;
    type Statistics = MockStatistics;

    fn initialize(&mut self, dca_iteration: usize) -> Result<(), KernelError> {
        self.iteration = Some(dca_iteration);
        self.measurements = 0;
        self.sum = 0.0;
        self.ledger
            .accumulator_iterations
            .lock()
            .unwrap()
            .push(dca_iteration);
        Ok(())
    }

    fn update_from(&mut self, walker: &MockWalker) -> Result<(), KernelError> {
        self.current = Some(walker.state);
        self.ledger
            .min_sweeps_at_measurement
            .fetch_min(walker.sweeps, Ordering::SeqCst);
        Ok(())
    }

    fn measure(&mut self) -> Result<(), KernelError> {
        let n = self.ledger.measurements.fetch_add(1, Ordering::SeqCst) + 1;
        if self.plan.panic_measure_at == Some(n) {
            panic!("measurement {n} blew up");
        }
        if self.plan.fail_measure_at == Some(n) {
            return Err(KernelError::NonFinite {
                observable: "G4".into(),
            });
        }
        let state = self
            .current
            .take()
            .ok_or_else(|| KernelError::failed("measure without update_from"))?;
        self.sum += state as f64 / u64::MAX as f64;
        self.measurements += 1;
        Ok(())
    }

    fn sum_to(&self, target: &mut MockStatistics) -> Result<(), KernelError> {
        if self.plan.fail_merge == Some(self.id) {
            return Err(KernelError::failed(format!("{} refused to merge", self.id)));
        }
        if self.plan.drop_count_on_merge != Some(self.id) {
            target.measurements += self.measurements;
        }
        target.sum += self.sum;
        target.contributions += 1;
        let mut merges = self.ledger.merges.lock().unwrap();
        if merges.len() <= self.id.0 {
            merges.resize(self.id.0 + 1, 0);
        }
        merges[self.id.0] += 1;
        Ok(())
    }

    fn number_of_measurements(&self) -> usize {
        match self.plan.overcount {
            Some(id) if id == self.id => self.measurements + 1,
            _ => self.measurements,
        }
    }
}

// ── Kernel ────────────────────────────────────────────────────────

/// Mock physics layer. Clones share the same ledger.
#[derive(Clone, Debug)]
pub struct MockKernel {
    ledger: Arc<Ledger>,
    plan: Arc<FailurePlan>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self::with_plan(FailurePlan::default())
    }

    pub fn with_plan(plan: FailurePlan) -> Self {
        Self {
            ledger: Arc::new(Ledger::new()),
            plan: Arc::new(plan),
        }
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl QmcKernel for MockKernel {
    type Rng = ChaCha8Rng;
    type Walker = MockWalker;
    type Accumulator = MockAccumulator;

    fn initialize(&self, dca_iteration: usize) -> Result<(), KernelError> {
        self.ledger
            .kernel_iterations
            .lock()
            .unwrap()
            .push(dca_iteration);
        Ok(())
    }

    fn new_walker(&self, id: WalkerId, _rng: &mut ChaCha8Rng) -> Result<MockWalker, KernelError> {
        if self.plan.fail_walker == Some(id) {
            return Err(KernelError::failed(format!("{id} could not be built")));
        }
        self.ledger.walkers_built.fetch_add(1, Ordering::SeqCst);
        Ok(MockWalker {
            id,
            sweeps: 0,
            state: 0,
            ledger: Arc::clone(&self.ledger),
            plan: Arc::clone(&self.plan),
        })
    }

    fn new_accumulator(&self, id: AccumulatorId) -> Result<MockAccumulator, KernelError> {
        self.ledger.accumulators_built.fetch_add(1, Ordering::SeqCst);
        Ok(MockAccumulator {
            id,
            measurements: 0,
            sum: 0.0,
            iteration: None,
            current: None,
            ledger: Arc::clone(&self.ledger),
            plan: Arc::clone(&self.plan),
        })
    }

    fn new_statistics(&self) -> MockStatistics {
        MockStatistics::default()
    }

    fn compute_error_bars(
        &self,
        statistics: &MockStatistics,
        _concurrency: &dyn Concurrency,
    ) -> Result<(), KernelError> {
        if statistics.mean.is_none() {
            return Err(KernelError::failed("error bars before finalize"));
        }
        self.ledger.error_bars.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finalize(
        &self,
        statistics: &mut MockStatistics,
        _dca_iteration: usize,
    ) -> Result<f64, KernelError> {
        self.ledger.finalizations.fetch_add(1, Ordering::SeqCst);
        let mean = statistics.mean.ok_or_else(|| KernelError::NonFinite {
            observable: "mean".into(),
        })?;
        statistics.error_bars = self.ledger.error_bars.load(Ordering::SeqCst) > 0;
        Ok((mean - 0.5).abs())
    }

    fn write(
        &self,
        statistics: &MockStatistics,
        writer: &mut dyn Writer,
    ) -> Result<(), WriteError> {
        writer.execute("sum", Value::Scalar(statistics.sum))?;
        if let Some(mean) = statistics.mean {
            writer.execute("mean", Value::Scalar(mean))?;
        }
        Ok(())
    }
}
