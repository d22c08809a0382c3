//! Core domain types and error taxonomy
//!
//! - `Order`: the domain order accepted from producers
//! - `Side`, `OrderType`, `OrderStatus`: single-byte enums with wire codes
//! - `fixed_point`: Decimal <-> 9-decimal fixed-point conversion
//! - Error enums for queues, codec and pool

pub mod errors;
pub mod types;

pub use errors::{CodecError, IdentifierField, IngestError, PoolError, QueueError};
pub use types::{fixed_point, now_ns, Order, OrderStatus, OrderType, Side};
