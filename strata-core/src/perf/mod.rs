//! Performance utilities
//!
//! - `cpu`: core pinning for worker threads, SCHED_FIFO for binaries

pub mod cpu;

pub use cpu::{num_cores, pin_to_core, pin_worker, set_realtime_priority};
