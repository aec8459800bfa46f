//! Synchronisation primitives of one `integrate()` call.
//!
//! [`CompletionSignal`] is the one-shot event the caller blocks on.
//! [`InFlight`] counts submitted tasks that have not finished, so the
//! caller can wait for the pool to go quiet after the signal fires.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Lock `mutex`, recovering the guard if a panicking task poisoned it.
///
/// Task bodies run under `catch_unwind` and a panic is recorded as the
/// failure of the integration, so the data behind a poisoned lock is
/// never trusted afterwards.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ── CompletionSignal ──────────────────────────────────────────────

/// One-shot event, settable once per reset.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    fired: Mutex<bool>,
    cond: Condvar,
    fast: AtomicBool,
    fires: AtomicUsize,
}

impl CompletionSignal {
    /// An unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal and wake all waiters.
    ///
    /// Returns `true` only for the caller that actually set it; later
    /// callers see `false` and change nothing.
    pub fn fire(&self) -> bool {
        let mut fired = lock(&self.fired);
        if *fired {
            return false;
        }
        *fired = true;
        self.fast.store(true, Ordering::Release);
        self.fires.fetch_add(1, Ordering::AcqRel);
        drop(fired);
        self.cond.notify_all();
        true
    }

    /// Lock-free check.
    pub fn is_fired(&self) -> bool {
        self.fast.load(Ordering::Acquire)
    }

    /// Block until the signal is set.
    pub fn wait(&self) {
        let mut fired = lock(&self.fired);
        while !*fired {
            fired = self.cond.wait(fired).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Clear the signal for the next integration.
    pub fn reset(&self) {
        let mut fired = lock(&self.fired);
        *fired = false;
        self.fast.store(false, Ordering::Release);
        self.fires.store(0, Ordering::Release);
    }

    /// Number of successful `fire` calls since the last reset.
    pub fn fire_count(&self) -> usize {
        self.fires.load(Ordering::Acquire)
    }
}

// ── InFlight ──────────────────────────────────────────────────────

/// Counter of submitted but unfinished tasks.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

/// Decrements its [`InFlight`] counter when dropped, whether the task ran
/// to completion, failed, or was discarded by the pool.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    owner: Arc<InFlight>,
}

impl InFlight {
    pub(crate) fn enter(self: &Arc<Self>) -> InFlightGuard {
        *lock(&self.count) += 1;
        InFlightGuard {
            owner: Arc::clone(self),
        }
    }

    pub(crate) fn current(&self) -> usize {
        *lock(&self.count)
    }

    pub(crate) fn wait_idle(&self) {
        let mut count = lock(&self.count);
        while *count > 0 {
            count = self.idle.wait(count).unwrap_or_else(|e| e.into_inner());
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = lock(&self.owner.count);
        *count -= 1;
        if *count == 0 {
            self.owner.idle.notify_all();
        }
    }
}
