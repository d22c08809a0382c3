//! Bounded lock-free queues
//!
//! - `buffer`: generic MPMC `RingBuffer<T>` with per-slot completion markers
//! - `notify`: parking used by the blocking variants
//! - `order_queue`: the order-ingestion queue (codec + ring of records)

pub mod buffer;
pub mod notify;
pub mod order_queue;

pub use buffer::{BatchPush, RingBuffer, PARK_SLICE};
pub use notify::Parker;
pub use order_queue::OrderQueue;
