//! Fork-join helpers over an [`Executor`].

use std::iter::Sum;
use std::sync::Arc;

use crate::error::PoolError;
use crate::executor::Executor;

/// Runs `n` copies of a closure on a pool and joins them.
///
/// The pool is enlarged to `n` workers first, so copies that block on each
/// other cannot starve.
#[derive(Debug)]
pub struct Threading<'a, E> {
    pool: &'a E,
}

impl<'a, E: Executor> Threading<'a, E> {
    /// Borrow `pool` for fork-join work.
    pub fn new(pool: &'a E) -> Self {
        Self { pool }
    }

    /// Call `f(id, num_tasks)` for every `id` in `0..num_tasks` and wait.
    ///
    /// Every task is joined even if one fails; the first failure is
    /// returned.
    pub fn execute<F>(&self, num_tasks: usize, f: F) -> Result<(), PoolError>
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.join_all(num_tasks, f).map(drop)
    }

    /// Call `f(id, num_tasks)` for every task and sum the results.
    pub fn sum_reduction<F, T>(&self, num_tasks: usize, f: F) -> Result<T, PoolError>
    where
        F: Fn(usize, usize) -> T + Send + Sync + 'static,
        T: Sum + Send + 'static,
    {
        self.join_all(num_tasks, f)
            .map(|values| values.into_iter().sum())
    }

    fn join_all<F, T>(&self, num_tasks: usize, f: F) -> Result<Vec<T>, PoolError>
    where
        F: Fn(usize, usize) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.pool.enlarge(num_tasks)?;
        let f = Arc::new(f);
        let mut handles = Vec::with_capacity(num_tasks);
        for id in 0..num_tasks {
            let f = Arc::clone(&f);
            handles.push(self.pool.enqueue(move || f(id, num_tasks))?);
        }
        let mut first_error = None;
        let mut values = Vec::with_capacity(num_tasks);
        for handle in handles {
            match handle.wait() {
                Ok(v) => values.push(v),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::{TaskPool, WorkerPool};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn execute_visits_every_id() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        Threading::new(&pool)
            .execute(6, move |id, n| {
                assert_eq!(n, 6);
                s.fetch_or(1 << id, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), 0b11_1111);
        assert_eq!(pool.size(), 6);
    }

    #[test]
    fn sum_reduction_adds_results() {
        let pool = TaskPool::with_workers(2).unwrap();
        let total: f64 = Threading::new(&pool)
            .sum_reduction(4, |id, _| id as f64 + 0.5)
            .unwrap();
        assert_eq!(total, 8.0);
    }

    #[test]
    fn failing_task_reported() {
        let pool = WorkerPool::with_workers(2).unwrap();
        let err = Threading::new(&pool)
            .execute(3, |id, _| {
                if id == 1 {
                    panic!("task one");
                }
            })
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::TaskFailed(TaskError::Panicked {
                message: "task one".into()
            })
        );
    }

    #[test]
    fn execute_joins_every_task_on_task_pool() {
        let pool = TaskPool::with_workers(2).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&done);
        let result = Threading::new(&pool).execute(5, move |_, _| {
            d.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(result, Ok(()));
        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn execute_joins_survivors_after_panic() {
        let pool = TaskPool::with_workers(1).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&done);
        let err = Threading::new(&pool)
            .execute(4, move |id, _| {
                if id == 0 {
                    panic!("first task");
                }
                d.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap_err();
        assert!(matches!(err, PoolError::TaskFailed(TaskError::Panicked { .. })));
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }
}
