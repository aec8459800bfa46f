//! Error types for pool management and task execution.

use std::error::Error;
use std::fmt;

/// Errors from creating, growing or submitting to a pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has been shut down and accepts no more work.
    ShutDown,
    /// A worker thread could not be spawned.
    SpawnFailed {
        /// Description of the OS failure.
        reason: String,
    },
    /// The configured worker stack is too small to be usable.
    InvalidStackSize {
        /// The configured size in bytes.
        bytes: usize,
    },
    /// A task run through a [`Threading`](crate::Threading) helper failed.
    TaskFailed(TaskError),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShutDown => write!(f, "pool has shut down"),
            Self::SpawnFailed { reason } => write!(f, "worker spawn failed: {reason}"),
            Self::InvalidStackSize { bytes } => {
                write!(f, "worker stack size {bytes} is below the 64 KiB minimum")
            }
            Self::TaskFailed(e) => write!(f, "task failed: {e}"),
        }
    }
}

impl Error for PoolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TaskFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TaskError> for PoolError {
    fn from(e: TaskError) -> Self {
        Self::TaskFailed(e)
    }
}

/// Outcome of a task that did not produce a value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskError {
    /// The task panicked. The panic was caught on the worker.
    Panicked {
        /// The panic payload, if it was a string.
        message: String,
    },
    /// The task was discarded without being run.
    Dropped,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panicked { message } => write!(f, "task panicked: {message}"),
            Self::Dropped => write!(f, "task dropped before it ran"),
        }
    }
}

impl Error for TaskError {}
