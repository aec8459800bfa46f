//! User-facing `ThreadedQmciSolver` API and its iteration lifecycle.
//!
//! One DCA iteration is `initialize(it)`, `integrate()`, `finalize(info)`,
//! optionally followed by `write(writer)`. `integrate()` submits every
//! accumulator and walker chain to the pool, blocks on the completion
//! signal, then waits for in-flight tasks to drain so that every handle
//! is parked or retired when it returns.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::SeedableRng;

use dca_core::{
    AccumulatorId, Concurrency, QmcKernel, RngIndex, SerialConcurrency, StatisticsOf, Value,
    WalkerId, WriteError, Writer,
};
use dca_parallel::{Executor, FromPoolConfig, TaskPool, WorkerPool};

use crate::config::{measurement_quotas, SolverConfig};
use crate::error::SolverError;
use crate::rendezvous::Rendezvous;
use crate::report::{DcaLoopInfo, IntegrationReport, IterationSummary, Probe};
use crate::seeding::{seed_generators, walker_seed};
use crate::signal::{lock, CompletionSignal};
use crate::slots::Slots;
use crate::stages::{submit, Shared, Stage};
use crate::thread_task_handler::ThreadTaskHandler;

/// Solver on the native-thread backend.
pub type NativeQmciSolver<K, C = SerialConcurrency> = ThreadedQmciSolver<K, WorkerPool, C>;

/// Solver on the cooperative task backend.
pub type TaskQmciSolver<K, C = SerialConcurrency> = ThreadedQmciSolver<K, TaskPool, C>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Initialized,
    Integrated,
    Finalized,
}

#[derive(Clone, Copy, Debug)]
struct LastRun {
    measurements: usize,
    elapsed: Duration,
}

/// Threaded QMC cluster-solver integration engine.
///
/// Generic over the physics kernel `K`, the execution backend `E` and the
/// rank-level concurrency `C`. The backend is fixed at build time.
pub struct ThreadedQmciSolver<K: QmcKernel, E: Executor, C: Concurrency = SerialConcurrency> {
    config: SolverConfig,
    concurrency: C,
    handler: ThreadTaskHandler,
    shared: Arc<Shared<K, E>>,
    lifecycle: Lifecycle,
    iteration: Option<usize>,
    last: Option<LastRun>,
    total_time: Duration,
}

impl<K: QmcKernel, E: FromPoolConfig, C: Concurrency> ThreadedQmciSolver<K, E, C> {
    /// Build a solver that owns a new pool of `config.worker_count()`
    /// workers.
    pub fn new(config: SolverConfig, kernel: K, concurrency: C) -> Result<Self, SolverError> {
        config.validate()?;
        let mut pool_config = config.pool.clone();
        pool_config.worker_count = Some(config.worker_count());
        let pool = E::from_pool_config(pool_config)?;
        Self::with_pool(config, kernel, concurrency, Arc::new(pool))
    }
}

impl<K: QmcKernel, E: Executor, C: Concurrency> ThreadedQmciSolver<K, E, C> {
    /// Build a solver on an existing pool. The pool is enlarged to at
    /// least one worker per walker and accumulator.
    pub fn with_pool(
        config: SolverConfig,
        kernel: K,
        concurrency: C,
        pool: Arc<E>,
    ) -> Result<Self, SolverError> {
        config.validate()?;
        let handler = ThreadTaskHandler::new(config.walkers, config.accumulators)?;
        pool.enlarge(config.walkers + config.accumulators)?;

        let rank_measurements = config.rank_measurements(&concurrency);
        let quotas = measurement_quotas(rank_measurements, config.accumulators);
        let rng_index: Vec<_> = (0..config.walkers)
            .map(|w| handler.walker_id_to_rng_index(WalkerId(w)))
            .collect();
        let rngs = seed_generators::<K::Rng>(
            config.seed,
            concurrency.id(),
            concurrency.number_of_processors(),
            config.walkers,
        );
        if concurrency.is_first() {
            tracing::debug!(
                seed = config.seed,
                rank = concurrency.id(),
                ranks = concurrency.number_of_processors(),
                generators = rngs.len(),
                "walker generators seeded"
            );
        }

        let shared = Arc::new(Shared {
            kernel,
            pool,
            warm_up_sweeps: config.warm_up_sweeps,
            rank_measurements,
            quotas,
            rng_index,
            walkers: Slots::new("walker", config.walkers),
            accumulators: Slots::new("accumulator", config.accumulators),
            rendezvous: Rendezvous::default(),
            rngs: Mutex::new(rngs.into_iter().map(Some).collect()),
            merged: Mutex::new(None),
            acc_finished: Default::default(),
            measured: Default::default(),
            dca_iteration: Default::default(),
            signal: CompletionSignal::new(),
            in_flight: Default::default(),
            failure: Mutex::new(None),
        });

        Ok(Self {
            config,
            concurrency,
            handler,
            shared,
            lifecycle: Lifecycle::Created,
            iteration: None,
            last: None,
            total_time: Duration::ZERO,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────────

    /// Prepare DCA iteration `dca_iteration`: reset the finished-accumulator
    /// count, prime the kernel and start from empty statistics.
    pub fn initialize(&mut self, dca_iteration: usize) -> Result<(), SolverError> {
        self.shared.acc_finished.store(0, Ordering::Release);
        self.shared
            .kernel
            .initialize(dca_iteration)
            .map_err(SolverError::kernel("initialize"))?;
        *lock(&self.shared.merged) = Some(self.shared.kernel.new_statistics());
        self.shared
            .dca_iteration
            .store(dca_iteration, Ordering::Release);
        self.iteration = Some(dca_iteration);
        self.last = None;
        self.lifecycle = Lifecycle::Initialized;
        if self.concurrency.is_first() {
            tracing::info!(dca_iteration, "QMC solver initialized");
        }
        Ok(())
    }

    /// Run the walker/accumulator pipeline until every accumulator has
    /// met its quota.
    ///
    /// Blocks the calling thread, which must not be a worker of the
    /// solver's own pool.
    pub fn integrate(&mut self) -> Result<IntegrationReport, SolverError> {
        if self.lifecycle != Lifecycle::Initialized {
            return Err(SolverError::NotInitialized);
        }
        self.lifecycle = Lifecycle::Integrated;
        let dca_iteration = self.iteration.unwrap_or_default();
        self.restore_generators(dca_iteration);
        self.shared.prepare();

        let first = self.concurrency.is_first();
        if first {
            self.handler.print();
            tracing::info!(
                dca_iteration,
                walkers = self.config.walkers,
                accumulators = self.config.accumulators,
                measurements = self.shared.rank_measurements,
                warm_up_sweeps = self.config.warm_up_sweeps,
                backend = self.shared.pool.name(),
                "integration started"
            );
        }

        let start = Instant::now();
        for a in 0..self.config.accumulators {
            submit(&self.shared, Stage::AccumulatorInit(AccumulatorId(a)));
        }
        for w in 0..self.config.walkers {
            submit(&self.shared, Stage::WalkerInit(WalkerId(w)));
        }
        self.shared.signal.wait();
        let elapsed = start.elapsed();
        self.shared.in_flight.wait_idle();

        let completion_fires = self.shared.signal.fire_count();
        let walker_census = self.shared.walkers.census();
        let accumulator_census = self.shared.accumulators.census();
        let (walkers, accumulators) = self.shared.collect();

        if let Some(error) = lock(&self.shared.failure).take() {
            return Err(error);
        }

        let measurements: usize = accumulators.iter().map(|a| a.measurements).sum();
        if measurements != self.shared.rank_measurements {
            return Err(SolverError::consistency(format!(
                "{measurements} measurements performed, {} required",
                self.shared.rank_measurements
            )));
        }
        if let Some(a) = accumulators.iter().find(|a| a.merges != 1) {
            return Err(SolverError::consistency(format!(
                "{} merged {} times",
                a.id, a.merges
            )));
        }
        let merged = self.shared.finalize_statistics();
        if merged != Some(measurements) {
            return Err(SolverError::consistency(format!(
                "merged statistics hold {} measurements, {measurements} performed",
                merged.unwrap_or(0)
            )));
        }

        self.last = Some(LastRun {
            measurements,
            elapsed,
        });
        self.total_time += elapsed;
        if first {
            tracing::info!(
                dca_iteration,
                measurements,
                elapsed_ms = elapsed.as_secs_f64() * 1e3,
                "integration finished"
            );
        }

        Ok(IntegrationReport {
            dca_iteration,
            target: self.shared.rank_measurements,
            measurements,
            elapsed,
            completion_fires,
            walker_census,
            accumulator_census,
            walkers,
            accumulators,
        })
    }

    /// Close the iteration: error bars on the last DCA iteration, rank
    /// reduction of the measurement count and QMC time, kernel
    /// finalization. Returns the L2 self-energy difference and records
    /// the iteration in `info`.
    pub fn finalize(&mut self, info: &mut DcaLoopInfo) -> Result<f64, SolverError> {
        let (Lifecycle::Integrated, Some(iteration), Some(last)) =
            (self.lifecycle, self.iteration, self.last)
        else {
            return Err(SolverError::NotInitialized);
        };
        let error_bars = iteration + 1 >= self.config.dca_iterations;

        let mut totals = [last.measurements as f64, last.elapsed.as_secs_f64()];
        self.concurrency.sum(&mut totals);

        let l2_difference = {
            let mut merged = lock(&self.shared.merged);
            let statistics = merged.as_mut().ok_or(SolverError::NotInitialized)?;
            if error_bars {
                self.shared
                    .kernel
                    .compute_error_bars(statistics, &self.concurrency)
                    .map_err(SolverError::kernel("error-bars"))?;
            }
            self.shared
                .kernel
                .finalize(statistics, iteration)
                .map_err(SolverError::kernel("finalize"))?
        };

        info.record(IterationSummary {
            dca_iteration: iteration,
            l2_difference,
            measurements: totals[0].round() as usize,
            qmc_time: Duration::from_secs_f64(totals[1].max(0.0)),
            error_bars,
        });
        self.lifecycle = Lifecycle::Finalized;
        if self.concurrency.is_first() {
            tracing::info!(
                dca_iteration = iteration,
                l2_difference,
                error_bars,
                "QMC solver finalized"
            );
        }
        Ok(l2_difference)
    }

    /// Write solver scalars into a `"QMC-solver"` group, then let the
    /// kernel write its physics output into the same group.
    pub fn write(&self, writer: &mut dyn Writer) -> Result<(), WriteError> {
        writer.open_group("QMC-solver")?;
        let last = self.last.map_or(0, |l| l.measurements);
        writer.execute("QMC-time", Value::Scalar(self.total_time.as_secs_f64()))?;
        writer.execute("measurements", count(last))?;
        writer.execute("walkers", count(self.config.walkers))?;
        writer.execute("accumulators", count(self.config.accumulators))?;
        if let Some(iteration) = self.iteration {
            writer.execute("dca-iteration", count(iteration))?;
        }
        if let Some(statistics) = lock(&self.shared.merged).as_ref() {
            self.shared.kernel.write(statistics, writer)?;
        }
        writer.close_group()
    }

    /// Put a fresh generator in every slot whose generator was lost with
    /// a failed task.
    fn restore_generators(&self, dca_iteration: usize) {
        let mut rngs = lock(&self.shared.rngs);
        for (index, slot) in rngs.iter_mut().enumerate() {
            if slot.is_none() {
                tracing::warn!(rng = index, dca_iteration, "reseeding lost walker generator");
                let base = self.config.seed ^ (dca_iteration as u64 + 1).rotate_left(32);
                *slot = Some(K::Rng::seed_from_u64(walker_seed(
                    base,
                    self.concurrency.id(),
                    self.concurrency.number_of_processors(),
                    self.shared
                        .rng_index
                        .get(index)
                        .copied()
                        .unwrap_or(RngIndex(index)),
                )));
            }
        }
    }

    // ── Accessors ─────────────────────────────────────────────────

    /// The configuration the solver was built with.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The physics kernel.
    pub fn kernel(&self) -> &K {
        &self.shared.kernel
    }

    /// The execution backend.
    pub fn pool(&self) -> &Arc<E> {
        &self.shared.pool
    }

    /// The rank-level concurrency.
    pub fn concurrency(&self) -> &C {
        &self.concurrency
    }

    /// The logical-id table.
    pub fn thread_task_handler(&self) -> &ThreadTaskHandler {
        &self.handler
    }

    /// Measurements this rank performs per integration.
    pub fn rank_measurements(&self) -> usize {
        self.shared.rank_measurements
    }

    /// Integration wall time summed over every `integrate()` call.
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    /// Run `f` on the merged statistics, if `initialize` has been called.
    pub fn with_statistics<R>(&self, f: impl FnOnce(&StatisticsOf<K>) -> R) -> Option<R> {
        lock(&self.shared.merged).as_ref().map(f)
    }

    /// A handle for observing the scheduler from another thread while
    /// `integrate()` runs.
    pub fn prober(&self) -> Prober<K, E> {
        Prober {
            shared: Arc::clone(&self.shared),
        }
    }
}

fn count(n: usize) -> Value<'static> {
    Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Observes a solver's queues and arenas; see
/// [`ThreadedQmciSolver::prober`].
pub struct Prober<K: QmcKernel, E> {
    shared: Arc<Shared<K, E>>,
}

impl<K: QmcKernel, E> Clone for Prober<K, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: QmcKernel, E> Prober<K, E> {
    /// Take a snapshot. Queue depths and slot phases are read under the
    /// rendezvous lock, so queued counts match queue depths exactly.
    pub fn probe(&self) -> Probe {
        self.shared.rendezvous.observe(|queues| Probe {
            queues,
            walkers: self.shared.walkers.census(),
            accumulators: self.shared.accumulators.census(),
            in_flight: self.shared.in_flight.current(),
        })
    }

    /// Whether the completion signal of the current integration is set.
    pub fn completed(&self) -> bool {
        self.shared.signal.is_fired()
    }
}
