//! Error types reported by the collaborators of the integration engine.
//!
//! The physics layer (walkers, accumulators, kernels) reports
//! [`KernelError`]; result sinks report [`WriteError`]. The engine wraps
//! both without interpreting them.

use std::error::Error;
use std::fmt;

/// Failure reported by the physics layer during a sweep, measurement,
/// merge or finalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// The operation could not be carried out.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A NaN or infinity showed up in an accumulated observable.
    NonFinite {
        /// Name of the offending observable.
        observable: String,
    },
}

impl KernelError {
    /// Shorthand for [`KernelError::ExecutionFailed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::NonFinite { observable } => {
                write!(f, "non-finite value in observable '{observable}'")
            }
        }
    }
}

impl Error for KernelError {}

/// Failure reported by a [`Writer`](crate::Writer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteError {
    /// The writer refused an entry.
    Rejected {
        /// Name of the entry.
        name: String,
        /// Why it was refused.
        reason: String,
    },
    /// `close_group` was called without a matching `open_group`.
    UnbalancedGroup,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { name, reason } => write!(f, "entry '{name}' rejected: {reason}"),
            Self::UnbalancedGroup => write!(f, "close_group without matching open_group"),
        }
    }
}

impl Error for WriteError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_error_display() {
        let e = KernelError::failed("singular matrix");
        assert_eq!(e.to_string(), "execution failed: singular matrix");
        let e = KernelError::NonFinite {
            observable: "G_k_w".into(),
        };
        assert!(e.to_string().contains("G_k_w"));
    }

    #[test]
    fn write_error_display() {
        let e = WriteError::Rejected {
            name: "Sigma".into(),
            reason: "read-only".into(),
        };
        assert_eq!(e.to_string(), "entry 'Sigma' rejected: read-only");
        assert_eq!(
            WriteError::UnbalancedGroup.to_string(),
            "close_group without matching open_group"
        );
    }
}
