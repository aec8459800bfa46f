//! Errors surfaced by the integration engine.
//!
//! Failures inside a task chain never unwind into the pool. The first one
//! is recorded, the completion signal is fired to release the caller, and
//! `integrate()` returns it once in-flight tasks have drained.

use std::error::Error;
use std::fmt;

use dca_core::KernelError;
use dca_parallel::PoolError;

use crate::config::ConfigError;

/// Errors returned by [`ThreadedQmciSolver`](crate::ThreadedQmciSolver).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolverError {
    /// The configuration was rejected at construction.
    Config(ConfigError),
    /// The physics layer failed inside a stage.
    Kernel {
        /// Stage that was running, e.g. `"walker-sweep"`.
        stage: &'static str,
        /// The kernel's error.
        source: KernelError,
    },
    /// A scheduling invariant was violated: a queued id whose slot holds
    /// no parked handle, a second merge of the same accumulator, a
    /// measurement total that does not match the quota, or a kernel
    /// measurement count that disagrees with the engine's.
    Consistency {
        /// What was found.
        reason: String,
    },
    /// The execution backend refused work.
    Backend(PoolError),
    /// A stage panicked. The panic was caught on the worker.
    TaskPanicked {
        /// Stage that was running.
        stage: &'static str,
        /// The panic payload, if it was a string.
        message: String,
    },
    /// `integrate()` or `finalize()` was called out of order.
    NotInitialized,
}

impl SolverError {
    pub(crate) fn consistency(reason: impl Into<String>) -> Self {
        Self::Consistency {
            reason: reason.into(),
        }
    }

    pub(crate) fn kernel(stage: &'static str) -> impl FnOnce(KernelError) -> Self {
        move |source| Self::Kernel { stage, source }
    }
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration: {e}"),
            Self::Kernel { stage, source } => write!(f, "{stage}: {source}"),
            Self::Consistency { reason } => write!(f, "internal consistency: {reason}"),
            Self::Backend(e) => write!(f, "backend: {e}"),
            Self::TaskPanicked { stage, message } => {
                write!(f, "{stage} panicked: {message}")
            }
            Self::NotInitialized => write!(f, "solver used before initialize()"),
        }
    }
}

impl Error for SolverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Kernel { source, .. } => Some(source),
            Self::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for SolverError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<PoolError> for SolverError {
    fn from(e: PoolError) -> Self {
        Self::Backend(e)
    }
}
