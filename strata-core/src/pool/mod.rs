//! Work-stealing worker pool
//!
//! - `coordinator`: [`WorkerPool`]: submission, stealing, supervision, shutdown
//! - `worker`: the per-thread loop
//! - `task`: [`Task`], [`TaskHandler`] and the [`TaskHandle`] future
//! - `stats` / `events`: observability snapshots and lifecycle notifications
//! - `config`: [`PoolConfig`]
//!
//! ```no_run
//! use strata_core::pool::{handler_fn, PoolConfig, Task, WorkerPool};
//! use std::time::Duration;
//!
//! let pool = WorkerPool::new(
//!     PoolConfig::default(),
//!     handler_fn(|task: Task<u64>| Ok(task.data * 2)),
//! )?;
//! let handle = pool.submit(Task::new(1, 0, 21));
//! assert_eq!(handle.wait()?, 42);
//! pool.shutdown(Duration::from_secs(1));
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod coordinator;
pub mod events;
pub mod stats;
pub mod task;
mod worker;

pub use config::PoolConfig;
pub use coordinator::{ShutdownReport, WorkerPool};
pub use events::PoolEvent;
pub use stats::{PoolStats, WorkerShared, WorkerState, WorkerStats};
pub use task::{handler_fn, FnHandler, Task, TaskHandle, TaskHandler, TaskId};
