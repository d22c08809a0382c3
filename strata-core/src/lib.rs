//! Strata Core - lock-free order ingestion and work-stealing execution
//!
//! The entry point of the trading platform's hot path: many producer threads
//! hand orders and tasks to many consumer threads without taking a lock.
//!
//! ## Architecture
//! - **Bounded MPMC ring** with per-slot generation stamps (ABA-free)
//! - **Fixed-width order records**: 12 × u64, no heap data in the queue
//! - **Work-stealing pool** with per-worker private queues and an overflow tier
//! - **Crash supervision**: panicking workers are replaced on the same queue
//!
//! ## Modules
//! - `core`: order types, fixed-point conversion, error taxonomy
//! - `ring`: `RingBuffer<T>`, parking, `OrderQueue`
//! - `codec`: order ⇄ record codec, symbol hashing, identifier packing
//! - `pool`: `WorkerPool`, tasks, handles, stats, events, config
//! - `perf`: CPU pinning and thread priority
//! - `resilience`: restart backoff and panic logging
//! - `utils`: tracing setup

pub mod codec;
pub mod core;
pub mod perf;
pub mod pool;
pub mod resilience;
pub mod ring;
pub mod utils;

pub use crate::codec::{DecodePolicy, OrderRecord, RecordCodec, SymbolCache};
pub use crate::core::{
    fixed_point, CodecError, IngestError, Order, OrderStatus, OrderType, PoolError, QueueError,
    Side,
};
pub use crate::pool::{
    handler_fn, PoolConfig, PoolEvent, PoolStats, ShutdownReport, Task, TaskHandle, TaskHandler,
    TaskId, WorkerPool,
};
pub use crate::ring::{OrderQueue, RingBuffer};

pub use anyhow::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::codec::{OrderRecord, RecordCodec, SymbolCache};
    pub use crate::core::{fixed_point, Order, OrderStatus, OrderType, PoolError, Side};
    pub use crate::pool::{
        handler_fn, PoolConfig, PoolEvent, Task, TaskHandle, TaskHandler, WorkerPool,
    };
    pub use crate::ring::{OrderQueue, RingBuffer};

    pub use crate::{Error, Result};
}
