//! Run a closure once per outer-loop iteration across many tasks.
//!
//! Several tasks may reach the same per-iteration setup step. The first
//! one to arrive with a new loop id runs it; the others block until it
//! has finished, then skip it. Loop ids must increase; a call with an id
//! at or below the last one executed does nothing.

use std::sync::Mutex;

/// Per-call-site state for [`call_once_per_loop`].
#[derive(Debug, Default)]
pub struct OncePerLoopFlag {
    last: Mutex<Option<u64>>,
}

impl OncePerLoopFlag {
    /// A flag that has not run for any loop.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last loop id `f` ran for.
    pub fn last_loop(&self) -> Option<u64> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Call `f` if no caller has done so yet for `loop_id`.
///
/// Returns `true` if this call ran `f`.
pub fn call_once_per_loop<F: FnOnce()>(flag: &OncePerLoopFlag, loop_id: u64, f: F) -> bool {
    let mut last = flag.last.lock().unwrap_or_else(|e| e.into_inner());
    if last.is_some_and(|done| done >= loop_id) {
        return false;
    }
    f();
    *last = Some(loop_id);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_once_per_id() {
        let flag = OncePerLoopFlag::new();
        let mut calls = Vec::new();
        for id in [0, 0, 1, 1, 1, 3, 2] {
            call_once_per_loop(&flag, id, || calls.push(id));
        }
        assert_eq!(calls, vec![0, 1, 3]);
        assert_eq!(flag.last_loop(), Some(3));
    }

    #[test]
    fn concurrent_callers_see_one_execution() {
        let flag = Arc::new(OncePerLoopFlag::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let flag = Arc::clone(&flag);
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for loop_id in 0..10 {
                        call_once_per_loop(&flag, loop_id, || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        });
                        // After returning, the setup for this loop is done.
                        assert!(counter.load(Ordering::SeqCst) as u64 > loop_id);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }
}
