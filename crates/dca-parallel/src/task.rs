//! Task packaging and completion handles.
//!
//! A closure submitted through [`Executor::enqueue`](crate::Executor::enqueue)
//! is wrapped so that its return value (or its panic) travels back over
//! a bounded(1) channel. The [`TaskHandle`] is the receiving end.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::{Receiver, TryRecvError};

use crate::error::TaskError;
use crate::executor::Job;

/// Handle to the eventual result of an enqueued task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: Receiver<Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes.
    ///
    /// Returns [`TaskError::Dropped`] if the pool discarded the task.
    pub fn wait(self) -> Result<T, TaskError> {
        match self.rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::Dropped),
        }
    }

    /// Return the outcome if the task has already finished.
    pub fn try_wait(&self) -> Option<Result<T, TaskError>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TaskError::Dropped)),
        }
    }
}

/// Wrap `f` into a [`Job`] and the handle that observes it.
pub fn package<F, T>(f: F) -> (Job, TaskHandle<T>)
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    let job: Job = Box::new(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
            TaskError::Panicked {
                message: panic_message(payload.as_ref()),
            }
        });
        // The caller may have dropped the handle; the result is discarded.
        let _ = tx.send(outcome);
    });
    (job, TaskHandle { rx })
}

/// Best-effort extraction of a panic payload's message.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
