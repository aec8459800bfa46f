//! Kernel failures, panics and backend shutdown abort the integration.
//!
//! The first failure is reported by `integrate()` once every in-flight
//! task has drained; the solver stays usable for the next iteration.

use std::sync::Arc;

use dca_core::{AccumulatorId, KernelError, SerialConcurrency, WalkerId};
use dca_parallel::{Executor, PoolConfig, PoolError, WorkerPool};
use dca_solver::{NativeQmciSolver, SolverConfig, SolverError, TaskQmciSolver, ThreadedQmciSolver};
use dca_test_utils::{FailurePlan, MockKernel};

fn config(walkers: usize, accumulators: usize, measurements: usize) -> SolverConfig {
    SolverConfig {
        walkers,
        accumulators,
        measurements,
        warm_up_sweeps: 2,
        pool: PoolConfig {
            worker_count: Some(walkers + accumulators),
            ..PoolConfig::default()
        },
        ..SolverConfig::default()
    }
}

fn native(plan: FailurePlan, cfg: SolverConfig) -> NativeQmciSolver<MockKernel> {
    NativeQmciSolver::new(cfg, MockKernel::with_plan(plan), SerialConcurrency).unwrap()
}

#[test]
fn sweep_failure_aborts_then_recovers() {
    let plan = FailurePlan {
        fail_sweep_at: Some(5),
        ..FailurePlan::default()
    };
    let mut solver = native(plan, config(2, 2, 40));

    solver.initialize(0).unwrap();
    match solver.integrate() {
        Err(SolverError::Kernel { stage, source }) => {
            assert!(stage == "walker-warm-up" || stage == "walker-sweep", "{stage}");
            assert!(matches!(source, KernelError::ExecutionFailed { .. }));
        }
        other => panic!("expected kernel error, got {other:?}"),
    }

    // The failing walker's generator is replaced on the next run.
    solver.initialize(1).unwrap();
    let report = solver.integrate().unwrap();
    assert_eq!(report.measurements, 40);
    assert_eq!(report.completion_fires, 1);
}

#[test]
fn measurement_failure_reported() {
    let plan = FailurePlan {
        fail_measure_at: Some(2),
        ..FailurePlan::default()
    };
    let mut solver = native(plan, config(3, 1, 10));
    solver.initialize(0).unwrap();
    let err = solver.integrate().unwrap_err();
    assert!(matches!(
        err,
        SolverError::Kernel {
            stage: "accumulator-measure",
            source: KernelError::NonFinite { .. },
        }
    ));
}

#[test]
fn panicking_measurement_is_contained() {
    let plan = FailurePlan {
        panic_measure_at: Some(3),
        ..FailurePlan::default()
    };
    let mut solver: TaskQmciSolver<MockKernel> =
        TaskQmciSolver::new(config(2, 2, 20), MockKernel::with_plan(plan), SerialConcurrency)
            .unwrap();

    solver.initialize(0).unwrap();
    match solver.integrate() {
        Err(SolverError::TaskPanicked { stage, message }) => {
            assert_eq!(stage, "accumulator-measure");
            assert!(message.contains("blew up"), "{message}");
        }
        other => panic!("expected panic report, got {other:?}"),
    }

    solver.initialize(1).unwrap();
    assert_eq!(solver.integrate().unwrap().measurements, 20);
}

#[test]
fn walker_construction_failure_repeats() {
    let plan = FailurePlan {
        fail_walker: Some(WalkerId(1)),
        ..FailurePlan::default()
    };
    let mut solver = native(plan, config(2, 1, 5));
    for iteration in 0..2 {
        solver.initialize(iteration).unwrap();
        assert!(matches!(
            solver.integrate(),
            Err(SolverError::Kernel {
                stage: "walker-init",
                ..
            })
        ));
    }
}

#[test]
fn merge_failure_reported() {
    let plan = FailurePlan {
        fail_merge: Some(AccumulatorId(1)),
        ..FailurePlan::default()
    };
    let mut solver = native(plan, config(2, 2, 8));
    solver.initialize(0).unwrap();
    assert!(matches!(
        solver.integrate(),
        Err(SolverError::Kernel {
            stage: "accumulator-merge",
            ..
        })
    ));
}

#[test]
fn accumulator_count_mismatch_reported() {
    let plan = FailurePlan {
        overcount: Some(AccumulatorId(0)),
        ..FailurePlan::default()
    };
    let mut solver = native(plan, config(2, 2, 8));
    solver.initialize(0).unwrap();
    match solver.integrate() {
        Err(SolverError::Consistency { reason }) => {
            assert!(reason.contains("accumulator-0 counts 2"), "{reason}");
        }
        other => panic!("expected consistency error, got {other:?}"),
    }
}

#[test]
fn short_merged_statistics_reported() {
    let plan = FailurePlan {
        drop_count_on_merge: Some(AccumulatorId(1)),
        ..FailurePlan::default()
    };
    let mut solver: TaskQmciSolver<MockKernel> =
        TaskQmciSolver::new(config(2, 2, 8), MockKernel::with_plan(plan), SerialConcurrency)
            .unwrap();
    for iteration in 0..2 {
        solver.initialize(iteration).unwrap();
        match solver.integrate() {
            Err(SolverError::Consistency { reason }) => {
                assert!(reason.contains("merged statistics hold 4"), "{reason}");
            }
            other => panic!("expected consistency error, got {other:?}"),
        }
    }
}

#[test]
fn shut_down_backend_rejects_integration() {
    let pool = Arc::new(WorkerPool::with_workers(2).unwrap());
    let mut solver = ThreadedQmciSolver::with_pool(
        config(1, 1, 4),
        MockKernel::new(),
        SerialConcurrency,
        Arc::clone(&pool),
    )
    .unwrap();
    pool.shutdown();

    solver.initialize(0).unwrap();
    assert_eq!(
        solver.integrate().unwrap_err(),
        SolverError::Backend(PoolError::ShutDown)
    );
}
