//! Crash handling for long-running worker threads
//!
//! - `backoff`: exponential restart throttling with jitter
//! - `panic`: panic hook that logs through `tracing` without exiting

pub mod backoff;
pub mod panic;

pub use backoff::{RestartBackoff, RestartPolicy};
pub use panic::{install_panic_handler, payload_message};
