//! End-to-end integration scenarios on both backends.
//!
//! Each test drives the full `initialize` / `integrate` / `finalize`
//! lifecycle against the instrumented mock kernel and checks the
//! measurement, merge and signal counts it reports.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dca_core::SerialConcurrency;
use dca_parallel::{Executor, FromPoolConfig, PoolConfig, TaskPool, WorkerPool};
use dca_solver::{
    ConfigError, DcaLoopInfo, NativeQmciSolver, Phase, SolverConfig, SolverError, TaskQmciSolver,
    ThreadedQmciSolver,
};
use dca_test_utils::{Entry, MemoryWriter, MirroredRanks, MockKernel};

fn config(walkers: usize, accumulators: usize, measurements: usize, warm_up: usize) -> SolverConfig {
    SolverConfig {
        walkers,
        accumulators,
        measurements,
        warm_up_sweeps: warm_up,
        pool: PoolConfig {
            worker_count: Some(walkers + accumulators),
            ..PoolConfig::default()
        },
        ..SolverConfig::default()
    }
}

// ── Reference scenarios ───────────────────────────────────────────

fn two_by_two<E: FromPoolConfig>() {
    let kernel = MockKernel::new();
    let ledger = kernel.ledger();
    let mut solver: ThreadedQmciSolver<MockKernel, E> =
        ThreadedQmciSolver::new(config(2, 2, 10, 3), kernel, SerialConcurrency).unwrap();

    solver.initialize(0).unwrap();
    let report = solver.integrate().unwrap();

    assert_eq!(report.target, 10);
    assert_eq!(report.measurements, 10);
    assert_eq!(report.accumulators.iter().map(|a| a.measurements).sum::<usize>(), 10);
    assert!(report.accumulators.iter().all(|a| a.measurements <= 10));
    assert_eq!(report.total_merges(), 2);
    assert_eq!(ledger.merges(), vec![1, 1]);
    assert_eq!(report.completion_fires, 1);
    assert!(report.elapsed > Duration::ZERO);

    // Every walker that was measured finished its warm-up first.
    for w in report.walkers.iter().filter(|w| w.measured > 0) {
        assert!(w.thermalized);
        assert_eq!(w.warm_up_sweeps, 3);
    }
    assert!(ledger.min_sweeps_at_measurement.load(Ordering::SeqCst) >= 4);

    assert_eq!(report.walker_census.running, 0);
    assert_eq!(report.walker_census.queued + report.walker_census.retired, 2);
    assert_eq!(report.accumulator_census.retired, 2);

    let merged = solver.with_statistics(|s| s.clone()).unwrap();
    assert_eq!(merged.measurements, 10);
    assert_eq!(merged.contributions, 2);
    assert!(merged.mean.is_some());
}

#[test]
fn two_walkers_two_accumulators_native() {
    two_by_two::<WorkerPool>();
}

#[test]
fn two_walkers_two_accumulators_task_pool() {
    two_by_two::<TaskPool>();
}

#[test]
fn single_walker_single_measurement() {
    let kernel = MockKernel::new();
    let ledger = kernel.ledger();
    let mut solver = NativeQmciSolver::new(config(1, 1, 1, 0), kernel, SerialConcurrency).unwrap();

    solver.initialize(0).unwrap();
    let report = solver.integrate().unwrap();

    assert_eq!(ledger.sweeps(), 1);
    assert_eq!(ledger.measurements(), 1);
    assert_eq!(ledger.merges(), vec![1]);
    assert_eq!(report.completion_fires, 1);
    assert_eq!(report.walkers[0].sweeps, 1);
    assert_eq!(report.walkers[0].phase, Phase::Retired);
}

#[test]
fn racing_walkers_fire_signal_once() {
    let kernel = MockKernel::new();
    let mut solver = TaskQmciSolver::new(config(4, 1, 1, 0), kernel, SerialConcurrency).unwrap();
    for iteration in 0..50 {
        solver.initialize(iteration).unwrap();
        let report = solver.integrate().unwrap();
        assert_eq!(report.completion_fires, 1);
        assert_eq!(report.measurements, 1);
        assert_eq!(report.total_merges(), 1);
    }
}

// ── Quotas ────────────────────────────────────────────────────────

#[test]
fn idle_accumulators_merge_empty_contributions() {
    let kernel = MockKernel::new();
    let ledger = kernel.ledger();
    let mut solver = NativeQmciSolver::new(config(2, 4, 2, 1), kernel, SerialConcurrency).unwrap();

    solver.initialize(0).unwrap();
    let report = solver.integrate().unwrap();

    let quotas: Vec<_> = report.accumulators.iter().map(|a| a.quota).collect();
    assert_eq!(quotas, vec![1, 1, 0, 0]);
    for a in &report.accumulators {
        assert_eq!(a.measurements, a.quota);
        assert_eq!(a.merges, 1);
    }
    assert_eq!(ledger.merges(), vec![1, 1, 1, 1]);
    assert_eq!(solver.with_statistics(|s| s.contributions), Some(4));
}

#[test]
fn more_accumulators_than_walkers() {
    let kernel = MockKernel::new();
    let mut solver = NativeQmciSolver::new(config(1, 6, 60, 2), kernel, SerialConcurrency).unwrap();
    solver.initialize(0).unwrap();
    let report = solver.integrate().unwrap();
    assert_eq!(report.measurements, 60);
    assert!(report.accumulators.iter().all(|a| a.measurements == 10));
    assert_eq!(report.walkers[0].measured, 60);
}

// ── Lifecycle ─────────────────────────────────────────────────────

#[test]
fn dca_loop_computes_error_bars_on_last_iteration() {
    let kernel = MockKernel::new();
    let ledger = kernel.ledger();
    let cfg = SolverConfig {
        dca_iterations: 3,
        ..config(3, 2, 20, 2)
    };
    let mut solver = NativeQmciSolver::new(cfg, kernel, SerialConcurrency).unwrap();
    let mut info = DcaLoopInfo::new();

    for iteration in 0..3 {
        solver.initialize(iteration).unwrap();
        solver.integrate().unwrap();
        let l2 = solver.finalize(&mut info).unwrap();
        assert!((0.0..=0.5).contains(&l2));
    }

    assert_eq!(info.len(), 3);
    let error_bars: Vec<_> = info.iterations().iter().map(|i| i.error_bars).collect();
    assert_eq!(error_bars, vec![false, false, true]);
    assert!(info.iterations().iter().all(|i| i.measurements == 20));
    assert_eq!(ledger.error_bars.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.finalizations.load(Ordering::SeqCst), 3);
    assert_eq!(*ledger.kernel_iterations.lock().unwrap(), vec![0, 1, 2]);
    let accumulator_iterations = ledger.accumulator_iterations.lock().unwrap().clone();
    assert_eq!(accumulator_iterations.len(), 6);
    assert_eq!(accumulator_iterations.iter().filter(|&&i| i == 2).count(), 2);
    assert!(solver.total_time() > Duration::ZERO);
}

#[test]
fn out_of_order_calls_rejected() {
    let mut solver =
        NativeQmciSolver::new(config(1, 1, 5, 0), MockKernel::new(), SerialConcurrency).unwrap();
    let mut info = DcaLoopInfo::new();
    assert!(matches!(solver.integrate(), Err(SolverError::NotInitialized)));

    solver.initialize(0).unwrap();
    assert!(matches!(
        solver.finalize(&mut info),
        Err(SolverError::NotInitialized)
    ));
    solver.integrate().unwrap();
    assert!(matches!(solver.integrate(), Err(SolverError::NotInitialized)));
    solver.finalize(&mut info).unwrap();
    assert!(matches!(
        solver.finalize(&mut info),
        Err(SolverError::NotInitialized)
    ));
    assert_eq!(info.len(), 1);
}

#[test]
fn invalid_config_rejected_at_construction() {
    let result = NativeQmciSolver::new(config(0, 1, 5, 0), MockKernel::new(), SerialConcurrency);
    assert!(matches!(
        result,
        Err(SolverError::Config(ConfigError::NoWalkers))
    ));
    let result = TaskQmciSolver::new(config(1, 0, 5, 0), MockKernel::new(), SerialConcurrency);
    assert!(matches!(
        result,
        Err(SolverError::Config(ConfigError::NoAccumulators))
    ));
}

#[test]
fn shared_pool_is_enlarged() {
    let pool = Arc::new(WorkerPool::with_workers(1).unwrap());
    let mut solver = ThreadedQmciSolver::with_pool(
        config(3, 2, 8, 1),
        MockKernel::new(),
        SerialConcurrency,
        Arc::clone(&pool),
    )
    .unwrap();
    assert!(pool.size() >= 5);
    solver.initialize(0).unwrap();
    assert_eq!(solver.integrate().unwrap().measurements, 8);
}

// ── Ranks and output ──────────────────────────────────────────────

#[test]
fn rank_share_and_reduction() {
    let ranks = MirroredRanks::new(1, 3);
    let mut solver = NativeQmciSolver::new(config(2, 2, 10, 1), MockKernel::new(), ranks).unwrap();
    assert_eq!(solver.rank_measurements(), 3);

    solver.initialize(0).unwrap();
    let report = solver.integrate().unwrap();
    assert_eq!(report.measurements, 3);
    assert_eq!(
        report.accumulators.iter().map(|a| a.quota).collect::<Vec<_>>(),
        vec![2, 1]
    );

    let mut info = DcaLoopInfo::new();
    solver.finalize(&mut info).unwrap();
    assert_eq!(info.last().unwrap().measurements, 9);
    assert_eq!(solver.concurrency().reductions(), 1);
}

#[test]
fn write_emits_solver_group() {
    let mut solver =
        NativeQmciSolver::new(config(2, 2, 12, 1), MockKernel::new(), SerialConcurrency).unwrap();
    solver.initialize(4).unwrap();
    solver.integrate().unwrap();
    solver.finalize(&mut DcaLoopInfo::new()).unwrap();

    let mut writer = MemoryWriter::new();
    solver.write(&mut writer).unwrap();
    assert!(writer.is_balanced());
    assert_eq!(writer.get("QMC-solver/measurements"), Some(&Entry::Integer(12)));
    assert_eq!(writer.get("QMC-solver/walkers"), Some(&Entry::Integer(2)));
    assert_eq!(writer.get("QMC-solver/accumulators"), Some(&Entry::Integer(2)));
    assert_eq!(writer.get("QMC-solver/dca-iteration"), Some(&Entry::Integer(4)));
    assert!(matches!(writer.get("QMC-solver/QMC-time"), Some(Entry::Scalar(t)) if *t > 0.0));
    assert!(matches!(writer.get("QMC-solver/mean"), Some(Entry::Scalar(_))));
}

#[test]
fn writer_rejection_propagates() {
    let solver =
        NativeQmciSolver::new(config(1, 1, 1, 0), MockKernel::new(), SerialConcurrency).unwrap();
    let mut writer = MemoryWriter::new();
    writer.reject.push("walkers".into());
    assert!(solver.write(&mut writer).is_err());
    assert!(writer.get("QMC-solver/measurements").is_some());
}
