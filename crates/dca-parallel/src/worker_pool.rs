//! Native-thread pool with one queue per worker.
//!
//! Jobs are dealt round-robin onto per-worker queues. Each queue is a
//! `Mutex<VecDeque<Job>>` paired with a `Condvar`. The shutdown flag is
//! only read while a queue lock is held, so a job pushed by `submit` is
//! either seen by its worker before it exits or rejected with
//! [`PoolError::ShutDown`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::executor::{join_workers, run_job, Executor, FromPoolConfig, Job};

struct WorkerQueue {
    jobs: Mutex<VecDeque<Job>>,
    ready: Condvar,
}

struct Shared {
    stop: AtomicBool,
    pending: AtomicUsize,
}

/// Native-thread [`Executor`].
pub struct WorkerPool {
    config: PoolConfig,
    shared: Arc<Shared>,
    queues: RwLock<Vec<Arc<WorkerQueue>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    next: AtomicUsize,
}

// Compile-time assertion: WorkerPool must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<WorkerPool>();
};

impl WorkerPool {
    /// Create a pool with `config.resolved_worker_count()` workers.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let workers = config.resolved_worker_count();
        let pool = Self {
            config,
            shared: Arc::new(Shared {
                stop: AtomicBool::new(false),
                pending: AtomicUsize::new(0),
            }),
            queues: RwLock::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            next: AtomicUsize::new(0),
        };
        pool.enlarge(workers)?;
        Ok(pool)
    }

    /// Create a pool with exactly `workers` threads and default stacks.
    pub fn with_workers(workers: usize) -> Result<Self, PoolError> {
        Self::new(PoolConfig {
            worker_count: Some(workers),
            ..PoolConfig::default()
        })
    }

    fn spawn_worker(&self, index: usize) -> Result<Arc<WorkerQueue>, PoolError> {
        let queue = Arc::new(WorkerQueue {
            jobs: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        });
        let worker_queue = Arc::clone(&queue);
        let shared = Arc::clone(&self.shared);
        let handle = self
            .config
            .thread_builder(index)
            .spawn(move || worker_loop(&worker_queue, &shared))
            .map_err(|e| PoolError::SpawnFailed {
                reason: e.to_string(),
            })?;
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
        Ok(queue)
    }
}

fn worker_loop(queue: &WorkerQueue, shared: &Shared) {
    loop {
        let job = {
            let mut jobs = queue.jobs.lock().unwrap_or_else(|e| e.into_inner());
            loop {
                if let Some(job) = jobs.pop_front() {
                    break job;
                }
                if shared.stop.load(Ordering::Acquire) {
                    return;
                }
                jobs = queue.ready.wait(jobs).unwrap_or_else(|e| e.into_inner());
            }
        };
        shared.pending.fetch_sub(1, Ordering::AcqRel);
        run_job(job);
    }
}

impl Executor for WorkerPool {
    fn name(&self) -> &'static str {
        "worker-pool"
    }

    fn submit(&self, job: Job) -> Result<(), PoolError> {
        let queues = self.queues.read().unwrap_or_else(|e| e.into_inner());
        if queues.is_empty() {
            return Err(PoolError::ShutDown);
        }
        let queue = &queues[self.next.fetch_add(1, Ordering::Relaxed) % queues.len()];
        let mut jobs = queue.jobs.lock().unwrap_or_else(|e| e.into_inner());
        if self.shared.stop.load(Ordering::Acquire) {
            return Err(PoolError::ShutDown);
        }
        jobs.push_back(job);
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        drop(jobs);
        queue.ready.notify_one();
        Ok(())
    }

    fn enlarge(&self, workers: usize) -> Result<(), PoolError> {
        let mut queues = self.queues.write().unwrap_or_else(|e| e.into_inner());
        if self.shared.stop.load(Ordering::Acquire) {
            return Err(PoolError::ShutDown);
        }
        let before = queues.len();
        while queues.len() < workers {
            let queue = self.spawn_worker(queues.len())?;
            queues.push(queue);
        }
        if queues.len() > before {
            tracing::debug!(from = before, to = queues.len(), "worker pool enlarged");
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.queues.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    fn shutdown(&self) -> usize {
        self.shared.stop.store(true, Ordering::Release);
        for queue in self.queues.read().unwrap_or_else(|e| e.into_inner()).iter() {
            // Taking the lock orders the store above before any worker's
            // next emptiness check.
            let _jobs = queue.jobs.lock().unwrap_or_else(|e| e.into_inner());
            queue.ready.notify_all();
        }
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(|e| e.into_inner()));
        let joined = join_workers(handles);
        if joined > 0 {
            tracing::debug!(workers = joined, "worker pool shut down");
        }
        joined
    }
}

impl FromPoolConfig for WorkerPool {
    fn from_pool_config(config: PoolConfig) -> Result<Self, PoolError> {
        Self::new(config)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size())
            .field("pending", &self.pending())
            .field("stopped", &self.shared.stop.load(Ordering::Relaxed))
            .finish()
    }
}
