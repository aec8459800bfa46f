//! Execution backends for the DCA++ integration engine.
//!
//! Two backends implement the [`Executor`] contract:
//!
//! - [`WorkerPool`]: native threads, one task queue per worker guarded by
//!   a mutex / condition-variable pair. Tasks are dealt round-robin.
//! - [`TaskPool`]: a cooperative task runtime. All workers drain one
//!   shared injector channel, so an idle worker always picks up the next
//!   task.
//!
//! The backend is a type parameter of the engine, chosen at build time;
//! nothing dispatches through a vtable on the hot path.
//!
//! Both pools grow on [`Executor::enlarge`] and never shrink. Dropping a
//! pool runs every task that was accepted before shutdown; tasks that
//! could not be run resolve their [`TaskHandle`] to
//! [`TaskError::Dropped`] instead of vanishing.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod executor;
pub mod once_per_loop;
pub mod task;
pub mod task_pool;
pub mod threading;
pub mod worker_pool;

pub use config::PoolConfig;
pub use error::{PoolError, TaskError};
pub use executor::{Executor, FromPoolConfig, Job};
pub use once_per_loop::{call_once_per_loop, OncePerLoopFlag};
pub use task::TaskHandle;
pub use task_pool::TaskPool;
pub use threading::Threading;
pub use worker_pool::WorkerPool;
