//! The walker/accumulator task graph.
//!
//! Every unit of work is a [`Stage`]. Running a stage yields the stages
//! that follow it: none when the handle was parked or retired, one for a
//! plain continuation, two when an accumulator is recycled straight into
//! a waiting walker while its own walker goes back to sweeping. The first
//! follow-up runs inline on the same worker; the rest are submitted.
//!
//! ```text
//! walker:      Init ─► Sweep ─► SweepCompleted ─┬─► (paired)  AccumulatorMeasure
//!                        ▲                      ├─► (no acc)  parked in walker queue
//!                        │                      └─► (target)  retired
//! accumulator: Init ─► TryMeasure ─┬─► (paired)   AccumulatorMeasure
//!                                  └─► (no walker) parked in accumulator queue
//! AccumulatorMeasure ─► Sweep(walker)
//!                   └─► quota met: merge + retire │ else: requeue (maybe paired)
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use smallvec::{smallvec, SmallVec};

use dca_core::{
    Accumulator, AccumulatorId, QmcKernel, RngIndex, Statistics, StatisticsOf, Walker, WalkerId,
};
use dca_parallel::task::panic_message;
use dca_parallel::{Executor, Job};

use crate::error::SolverError;
use crate::report::{AccumulatorSummary, WalkerSummary};
use crate::rendezvous::{Offer, Rendezvous};
use crate::signal::{lock, CompletionSignal, InFlight};
use crate::slots::Slots;

// ── Handles ───────────────────────────────────────────────────────

pub(crate) struct WalkerHandle<K: QmcKernel> {
    id: WalkerId,
    rng_index: RngIndex,
    walker: K::Walker,
    rng: K::Rng,
    thermalized: bool,
    warm_up_sweeps: usize,
    sweeps: usize,
    measured: usize,
}

pub(crate) struct AccumulatorHandle<K: QmcKernel> {
    id: AccumulatorId,
    accumulator: K::Accumulator,
    quota: usize,
    measurements: usize,
    merges: usize,
}

// ── Stage ─────────────────────────────────────────────────────────

pub(crate) enum Stage<K: QmcKernel> {
    WalkerInit(WalkerId),
    WalkerSweep(WalkerHandle<K>),
    WalkerSweepCompleted(WalkerHandle<K>),
    AccumulatorInit(AccumulatorId),
    AccumulatorTryMeasure(AccumulatorHandle<K>),
    AccumulatorMeasure(AccumulatorHandle<K>, WalkerHandle<K>),
}

impl<K: QmcKernel> Stage<K> {
    fn name(&self) -> &'static str {
        match self {
            Self::WalkerInit(_) => "walker-init",
            Self::WalkerSweep(_) => "walker-sweep",
            Self::WalkerSweepCompleted(_) => "walker-sweep-completed",
            Self::AccumulatorInit(_) => "accumulator-init",
            Self::AccumulatorTryMeasure(_) => "accumulator-try-measure",
            Self::AccumulatorMeasure(..) => "accumulator-measure",
        }
    }
}

type Next<K> = SmallVec<[Stage<K>; 2]>;

// ── Shared ────────────────────────────────────────────────────────

/// State shared by every task of one solver.
pub(crate) struct Shared<K: QmcKernel, E> {
    pub(crate) kernel: K,
    pub(crate) pool: Arc<E>,
    pub(crate) warm_up_sweeps: usize,
    pub(crate) rank_measurements: usize,
    pub(crate) quotas: Vec<usize>,
    pub(crate) rng_index: Vec<RngIndex>,
    pub(crate) walkers: Slots<WalkerHandle<K>>,
    pub(crate) accumulators: Slots<AccumulatorHandle<K>>,
    pub(crate) rendezvous: Rendezvous,
    pub(crate) rngs: Mutex<Vec<Option<K::Rng>>>,
    pub(crate) merged: Mutex<Option<StatisticsOf<K>>>,
    pub(crate) acc_finished: AtomicUsize,
    pub(crate) measured: AtomicUsize,
    pub(crate) dca_iteration: AtomicUsize,
    pub(crate) signal: CompletionSignal,
    pub(crate) in_flight: Arc<InFlight>,
    pub(crate) failure: Mutex<Option<SolverError>>,
}

/// Submit `stage` to the pool as its own task.
pub(crate) fn submit<K: QmcKernel, E: Executor>(shared: &Arc<Shared<K, E>>, stage: Stage<K>) {
    let guard = shared.in_flight.enter();
    let task = Arc::clone(shared);
    let job: Job = Box::new(move || {
        drive(&task, stage);
        // Release the solver before the guard, so the caller never
        // outlives its pool on a worker thread.
        drop(task);
        drop(guard);
    });
    if let Err(e) = shared.pool.submit(job) {
        shared.abort(SolverError::Backend(e));
    }
}

fn drive<K: QmcKernel, E: Executor>(shared: &Arc<Shared<K, E>>, stage: Stage<K>) {
    let mut current = stage;
    loop {
        let name = current.name();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| shared.step(current)));
        let mut next = match outcome {
            Ok(Ok(next)) => next,
            Ok(Err(e)) => {
                shared.abort(e);
                return;
            }
            Err(payload) => {
                shared.abort(SolverError::TaskPanicked {
                    stage: name,
                    message: panic_message(payload.as_ref()),
                });
                return;
            }
        };
        if next.is_empty() {
            return;
        }
        let inline = next.remove(0);
        for stage in next {
            submit(shared, stage);
        }
        current = inline;
    }
}

impl<K: QmcKernel, E> Shared<K, E> {
    fn step(&self, stage: Stage<K>) -> Result<Next<K>, SolverError> {
        match stage {
            Stage::WalkerInit(id) => self.walker_init(id),
            Stage::WalkerSweep(w) => self.walker_sweep(w),
            Stage::WalkerSweepCompleted(w) => self.walker_sweep_completed(w),
            Stage::AccumulatorInit(id) => self.accumulator_init(id),
            Stage::AccumulatorTryMeasure(a) => self.accumulator_try_measure(a),
            Stage::AccumulatorMeasure(a, w) => self.accumulator_measure(a, w),
        }
    }

    /// Record the first failure of this integration and release the caller.
    pub(crate) fn abort(&self, error: SolverError) {
        {
            let mut failure = lock(&self.failure);
            if failure.is_none() {
                tracing::error!(%error, "integration aborted");
                *failure = Some(error);
            } else {
                tracing::debug!(%error, "further failure after abort");
            }
        }
        self.signal.fire();
    }

    fn target_reached(&self) -> bool {
        self.acc_finished.load(Ordering::Acquire) >= self.accumulators.len()
    }

    // ── Walker stages ─────────────────────────────────────────────

    fn walker_init(&self, id: WalkerId) -> Result<Next<K>, SolverError> {
        self.walkers.start(id.0)?;
        let rng_index = self.rng_index.get(id.0).copied().ok_or_else(|| {
            SolverError::consistency(format!("{id} has no generator slot"))
        })?;
        let mut rng = lock(&self.rngs)
            .get_mut(rng_index.0)
            .and_then(Option::take)
            .ok_or_else(|| {
                SolverError::consistency(format!("generator {rng_index} is not available"))
            })?;

        let mut walker = self
            .kernel
            .new_walker(id, &mut rng)
            .map_err(SolverError::kernel("walker-init"))?;
        walker
            .initialize(&mut rng)
            .map_err(SolverError::kernel("walker-init"))?;

        let mut handle: WalkerHandle<K> = WalkerHandle {
            id,
            rng_index,
            walker,
            rng,
            thermalized: false,
            warm_up_sweeps: 0,
            sweeps: 0,
            measured: 0,
        };
        for i in 0..self.warm_up_sweeps {
            if self.signal.is_fired() {
                break;
            }
            handle
                .walker
                .do_sweep(&mut handle.rng)
                .map_err(SolverError::kernel("walker-warm-up"))?;
            handle.warm_up_sweeps += 1;
            handle.walker.update_shell(i + 1, self.warm_up_sweeps);
        }
        handle.thermalized = handle.warm_up_sweeps == self.warm_up_sweeps;
        tracing::trace!(
            walker = %id,
            sweeps = handle.warm_up_sweeps,
            thermalized = handle.thermalized,
            "warm-up done"
        );
        Ok(smallvec![Stage::WalkerSweep(handle)])
    }

    fn walker_sweep(&self, mut w: WalkerHandle<K>) -> Result<Next<K>, SolverError> {
        if !self.signal.is_fired() {
            w.walker
                .do_sweep(&mut w.rng)
                .map_err(SolverError::kernel("walker-sweep"))?;
            w.sweeps += 1;
        }
        Ok(smallvec![Stage::WalkerSweepCompleted(w)])
    }

    fn walker_sweep_completed(&self, w: WalkerHandle<K>) -> Result<Next<K>, SolverError> {
        let id = w.id;
        if self.target_reached() && self.signal.fire() {
            tracing::debug!(walker = %id, "completion signalled by walker");
        }
        if self.signal.is_fired() {
            self.walkers.retire(id.0, w)?;
            tracing::trace!(walker = %id, "walker retired");
            return Ok(SmallVec::new());
        }
        match self
            .rendezvous
            .offer_walker(id.0, w, &self.walkers, &self.accumulators)?
        {
            Offer::Paired(w, a) => {
                tracing::trace!(walker = %id, accumulator = %a.id, "paired");
                Ok(smallvec![Stage::AccumulatorMeasure(a, w)])
            }
            Offer::Parked => {
                tracing::trace!(walker = %id, "walker waiting");
                Ok(SmallVec::new())
            }
        }
    }

    // ── Accumulator stages ────────────────────────────────────────

    fn accumulator_init(&self, id: AccumulatorId) -> Result<Next<K>, SolverError> {
        self.accumulators.start(id.0)?;
        let quota = self.quotas.get(id.0).copied().ok_or_else(|| {
            SolverError::consistency(format!("{id} has no measurement quota"))
        })?;
        let mut accumulator = self
            .kernel
            .new_accumulator(id)
            .map_err(SolverError::kernel("accumulator-init"))?;
        accumulator
            .initialize(self.dca_iteration.load(Ordering::Acquire))
            .map_err(SolverError::kernel("accumulator-init"))?;
        let handle: AccumulatorHandle<K> = AccumulatorHandle {
            id,
            accumulator,
            quota,
            measurements: 0,
            merges: 0,
        };
        if quota == 0 {
            self.complete(handle)?;
            return Ok(SmallVec::new());
        }
        Ok(smallvec![Stage::AccumulatorTryMeasure(handle)])
    }

    fn accumulator_try_measure(&self, a: AccumulatorHandle<K>) -> Result<Next<K>, SolverError> {
        let id = a.id;
        // Quota unmet and the signal set: the integration was aborted.
        if self.signal.is_fired() {
            self.accumulators.retire(id.0, a)?;
            return Ok(SmallVec::new());
        }
        match self
            .rendezvous
            .offer_accumulator(id.0, a, &self.walkers, &self.accumulators)?
        {
            Offer::Paired(a, w) => {
                tracing::trace!(walker = %w.id, accumulator = %id, "paired");
                Ok(smallvec![Stage::AccumulatorMeasure(a, w)])
            }
            Offer::Parked => {
                tracing::trace!(accumulator = %id, "accumulator waiting");
                Ok(SmallVec::new())
            }
        }
    }

    fn accumulator_measure(
        &self,
        mut a: AccumulatorHandle<K>,
        mut w: WalkerHandle<K>,
    ) -> Result<Next<K>, SolverError> {
        let done = self.measured.fetch_add(1, Ordering::AcqRel);
        w.walker.update_shell(done, self.rank_measurements);
        a.accumulator
            .update_from(&w.walker)
            .map_err(SolverError::kernel("accumulator-measure"))?;
        a.accumulator
            .measure()
            .map_err(SolverError::kernel("accumulator-measure"))?;
        a.measurements += 1;
        w.measured += 1;
        let counted = a.accumulator.number_of_measurements();
        if counted != a.measurements {
            return Err(SolverError::consistency(format!(
                "{} counts {} measurements, {} performed",
                a.id, counted, a.measurements
            )));
        }
        if a.measurements > a.quota {
            return Err(SolverError::consistency(format!(
                "{} measured {} times against a quota of {}",
                a.id, a.measurements, a.quota
            )));
        }

        let mut next: Next<K> = smallvec![Stage::WalkerSweep(w)];
        if a.measurements == a.quota {
            self.complete(a)?;
        } else {
            let id = a.id;
            match self
                .rendezvous
                .offer_accumulator(id.0, a, &self.walkers, &self.accumulators)?
            {
                Offer::Paired(a, waiting) => {
                    tracing::trace!(walker = %waiting.id, accumulator = %id, "paired on requeue");
                    next.push(Stage::AccumulatorMeasure(a, waiting));
                }
                Offer::Parked => tracing::trace!(accumulator = %id, "accumulator requeued"),
            }
        }
        Ok(next)
    }

    /// Merge a finished accumulator into the shared result and retire it.
    fn complete(&self, mut a: AccumulatorHandle<K>) -> Result<(), SolverError> {
        if a.merges > 0 {
            return Err(SolverError::consistency(format!("{} merged twice", a.id)));
        }
        {
            let mut merged = lock(&self.merged);
            let target = merged.as_mut().ok_or(SolverError::NotInitialized)?;
            a.accumulator
                .sum_to(target)
                .map_err(SolverError::kernel("accumulator-merge"))?;
        }
        a.merges += 1;
        let id = a.id;
        let measurements = a.measurements;
        self.accumulators.retire(id.0, a)?;
        let finished = self.acc_finished.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(accumulator = %id, measurements, finished, "accumulator merged");
        if finished == self.accumulators.len() && self.signal.fire() {
            tracing::debug!(accumulator = %id, "measurement target reached");
        }
        Ok(())
    }

    // ── Integration bookkeeping ───────────────────────────────────

    /// Clear per-integration state. Slots are already vacant.
    pub(crate) fn prepare(&self) {
        self.signal.reset();
        self.acc_finished.store(0, Ordering::Release);
        self.measured.store(0, Ordering::Release);
        *lock(&self.failure) = None;
        self.rendezvous.clear();
    }

    /// Empty both arenas, hand generators back to the pool and summarise.
    pub(crate) fn collect(&self) -> (Vec<WalkerSummary>, Vec<AccumulatorSummary>) {
        let (walkers, accumulators) = self
            .rendezvous
            .clear_with(|| (self.walkers.drain(), self.accumulators.drain()));
        let mut rngs = lock(&self.rngs);
        let walkers = walkers
            .into_iter()
            .enumerate()
            .map(|(i, (phase, handle))| match handle {
                Some(h) => {
                    if let Some(slot) = rngs.get_mut(h.rng_index.0) {
                        *slot = Some(h.rng);
                    }
                    WalkerSummary {
                        id: h.id,
                        rng_index: h.rng_index,
                        warm_up_sweeps: h.warm_up_sweeps,
                        sweeps: h.sweeps,
                        measured: h.measured,
                        thermalized: h.thermalized,
                        phase,
                    }
                }
                None => WalkerSummary {
                    id: WalkerId(i),
                    rng_index: self.rng_index.get(i).copied().unwrap_or(RngIndex(i)),
                    warm_up_sweeps: 0,
                    sweeps: 0,
                    measured: 0,
                    thermalized: false,
                    phase,
                },
            })
            .collect();
        drop(rngs);

        let accumulators = accumulators
            .into_iter()
            .enumerate()
            .map(|(i, (_, handle))| AccumulatorSummary {
                id: AccumulatorId(i),
                quota: self.quotas.get(i).copied().unwrap_or(0),
                measurements: handle.as_ref().map_or(0, |h| h.measurements),
                merges: handle.as_ref().map_or(0, |h| h.merges),
            })
            .collect();
        (walkers, accumulators)
    }

    /// Finalize the merged statistics; returns the merged measurement count.
    pub(crate) fn finalize_statistics(&self) -> Option<usize> {
        lock(&self.merged).as_mut().map(|stats| {
            stats.finalize();
            stats.number_of_measurements()
        })
    }
}
