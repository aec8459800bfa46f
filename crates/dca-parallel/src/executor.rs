//! The contract every execution backend satisfies.

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::task::{self, TaskHandle};

/// A unit of work accepted by an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A pool of workers that runs submitted jobs.
///
/// Implementations must:
///
/// - run every job accepted by [`submit`](Executor::submit), even if the
///   pool is dropped before a worker reaches it;
/// - reject jobs with [`PoolError::ShutDown`] once shutdown has begun;
/// - keep a worker alive when a job panics.
pub trait Executor: Send + Sync + 'static {
    /// Backend name, used in logs.
    fn name(&self) -> &'static str;

    /// Hand a job to the pool.
    fn submit(&self, job: Job) -> Result<(), PoolError>;

    /// Grow the pool to at least `workers` threads. Never shrinks.
    fn enlarge(&self, workers: usize) -> Result<(), PoolError>;

    /// Current number of workers.
    fn size(&self) -> usize;

    /// Jobs accepted but not yet picked up by a worker.
    fn pending(&self) -> usize;

    /// Stop accepting work, run what is queued and join the workers.
    ///
    /// Returns the number of workers joined by this call. Idempotent;
    /// called automatically on drop.
    fn shutdown(&self) -> usize;

    /// Submit `f` and return a handle to its result.
    fn enqueue<F, T>(&self, f: F) -> Result<TaskHandle<T>, PoolError>
    where
        Self: Sized,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (job, handle) = task::package(f);
        self.submit(job)?;
        Ok(handle)
    }
}

/// Executors that can be built from a [`PoolConfig`].
pub trait FromPoolConfig: Executor + Sized {
    /// Validate `config` and spawn the configured number of workers.
    fn from_pool_config(config: PoolConfig) -> Result<Self, PoolError>;
}

// ── Worker helpers shared by the backends ──────────────────────

/// Run one job on a worker, keeping the worker alive if it panics.
pub(crate) fn run_job(job: Job) {
    if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
        tracing::warn!(
            message = %task::panic_message(payload.as_ref()),
            "job panicked on pool worker"
        );
    }
}

/// Join `handles`, skipping the calling thread.
///
/// A pool can be dropped from one of its own workers when a job holds the
/// last reference to it. That worker is detached; it exits on its own
/// once its loop observes shutdown.
pub(crate) fn join_workers(handles: Vec<std::thread::JoinHandle<()>>) -> usize {
    let current = std::thread::current().id();
    let mut joined = 0;
    for handle in handles {
        if handle.thread().id() == current {
            continue;
        }
        match handle.join() {
            Ok(()) => joined += 1,
            Err(_) => tracing::error!("pool worker terminated by panic"),
        }
    }
    joined
}
