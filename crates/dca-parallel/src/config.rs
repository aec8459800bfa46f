//! Pool sizing and worker-thread configuration.

use crate::error::PoolError;

/// Smallest worker stack accepted by [`PoolConfig::validate`].
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Stack size used for walker and accumulator tasks, which keep large
/// temporaries on the stack.
pub const LARGE_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Upper bound on the resolved worker count.
pub const MAX_WORKERS: usize = 256;

/// Configuration shared by both pool backends.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of workers spawned at construction. `None` = auto-detect
    /// from `available_parallelism`.
    pub worker_count: Option<usize>,
    /// Stack size per worker in bytes. `None` = platform default.
    pub stack_size: Option<usize>,
    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            stack_size: None,
            thread_name_prefix: "dca-worker".into(),
        }
    }
}

impl PoolConfig {
    /// A configuration with `n` workers and large stacks.
    pub fn large_stack(n: usize) -> Self {
        Self {
            worker_count: Some(n),
            stack_size: Some(LARGE_STACK_SIZE),
            ..Self::default()
        }
    }

    /// Resolve the actual worker count, applying auto-detection if `None`.
    ///
    /// Values are clamped to `[1, MAX_WORKERS]`.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(n) => n.clamp(1, MAX_WORKERS),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .clamp(1, MAX_WORKERS),
        }
    }

    /// Check the stack size.
    pub fn validate(&self) -> Result<(), PoolError> {
        match self.stack_size {
            Some(bytes) if bytes < MIN_STACK_SIZE => Err(PoolError::InvalidStackSize { bytes }),
            _ => Ok(()),
        }
    }

    pub(crate) fn thread_builder(&self, index: usize) -> std::thread::Builder {
        let builder =
            std::thread::Builder::new().name(format!("{}-{index}", self.thread_name_prefix));
        match self.stack_size {
            Some(bytes) => builder.stack_size(bytes),
            None => builder,
        }
    }
}
