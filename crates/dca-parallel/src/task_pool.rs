//! Cooperative task runtime.
//!
//! Every worker pulls from one shared unbounded injector channel, so the
//! next job goes to whichever worker frees up first. Shutdown drops the
//! sending side; workers drain what is left in the channel and exit when
//! it reports disconnection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::executor::{join_workers, run_job, Executor, FromPoolConfig, Job};

/// Work-sharing [`Executor`] over a single injector channel.
pub struct TaskPool {
    config: PoolConfig,
    injector: RwLock<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    spawned: AtomicUsize,
}

// Compile-time assertion: TaskPool must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<TaskPool>();
};

impl TaskPool {
    /// Create a runtime with `config.resolved_worker_count()` workers.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let workers = config.resolved_worker_count();
        let (tx, rx) = crossbeam_channel::unbounded();
        let pool = Self {
            config,
            injector: RwLock::new(Some(tx)),
            receiver: rx,
            handles: Mutex::new(Vec::new()),
            spawned: AtomicUsize::new(0),
        };
        pool.enlarge(workers)?;
        Ok(pool)
    }

    /// Create a runtime with exactly `workers` threads and default stacks.
    pub fn with_workers(workers: usize) -> Result<Self, PoolError> {
        Self::new(PoolConfig {
            worker_count: Some(workers),
            thread_name_prefix: "dca-task".into(),
            ..PoolConfig::default()
        })
    }
}

impl Executor for TaskPool {
    fn name(&self) -> &'static str {
        "task-pool"
    }

    fn submit(&self, job: Job) -> Result<(), PoolError> {
        let injector = self.injector.read().unwrap_or_else(|e| e.into_inner());
        match injector.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| PoolError::ShutDown),
            None => Err(PoolError::ShutDown),
        }
    }

    fn enlarge(&self, workers: usize) -> Result<(), PoolError> {
        // Holding the injector lock serialises growth against shutdown.
        let injector = self.injector.read().unwrap_or_else(|e| e.into_inner());
        if injector.is_none() {
            return Err(PoolError::ShutDown);
        }
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        let before = self.spawned.load(Ordering::Acquire);
        for index in before..workers {
            let rx = self.receiver.clone();
            let handle = self
                .config
                .thread_builder(index)
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        run_job(job);
                    }
                })
                .map_err(|e| PoolError::SpawnFailed {
                    reason: e.to_string(),
                })?;
            handles.push(handle);
            self.spawned.store(index + 1, Ordering::Release);
        }
        if workers > before {
            tracing::debug!(from = before, to = workers, "task pool enlarged");
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.spawned.load(Ordering::Acquire)
    }

    fn pending(&self) -> usize {
        self.receiver.len()
    }

    fn shutdown(&self) -> usize {
        drop(
            self.injector
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
        );
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(|e| e.into_inner()));
        let joined = join_workers(handles);
        if joined > 0 {
            tracing::debug!(workers = joined, "task pool shut down");
        }
        joined
    }
}

impl FromPoolConfig for TaskPool {
    fn from_pool_config(config: PoolConfig) -> Result<Self, PoolError> {
        Self::new(config)
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("size", &self.size())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn shared_queue_runs_everything() {
        let pool = TaskPool::with_workers(3).unwrap();
        let handles: Vec<_> = (0..32u32).map(|i| pool.enqueue(move || i).unwrap()).collect();
        let total: u32 = handles.into_iter().map(|h| h.wait().unwrap()).sum();
        assert_eq!(total, (0..32u32).sum::<u32>());
    }

    #[test]
    fn enlarge_is_monotone() {
        let pool = TaskPool::with_workers(1).unwrap();
        pool.enlarge(4).unwrap();
        pool.enlarge(2).unwrap();
        assert_eq!(pool.size(), 4);
    }

    #[test]
    fn enlarged_pool_runs_blocking_jobs_side_by_side() {
        use std::collections::HashSet;
        use std::sync::Barrier;
        use std::thread;

        let pool = TaskPool::with_workers(1).unwrap();
        pool.enlarge(6).unwrap();
        let barrier = Arc::new(Barrier::new(6));
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let b = Arc::clone(&barrier);
                pool.enqueue(move || {
                    b.wait();
                    thread::current().id()
                })
                .unwrap()
            })
            .collect();
        let ids: HashSet<_> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn drop_drains_injector() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = TaskPool::with_workers(2).unwrap();
            for _ in 0..100 {
                let c = Arc::clone(&counter);
                pool.submit(Box::new(move || {
                    c.fetch_add(1, Ordering::Relaxed);
                }))
                .unwrap();
            }
        }
        assert_eq!(counter.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn rejects_after_shutdown() {
        let pool = TaskPool::with_workers(2).unwrap();
        assert_eq!(pool.shutdown(), 2);
        assert!(matches!(pool.submit(Box::new(|| ())), Err(PoolError::ShutDown)));
    }
}
