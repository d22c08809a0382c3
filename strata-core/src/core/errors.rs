//! Error taxonomy for the ingestion queue, the record codec and the pool
//!
//! Full and empty ring buffers are NOT errors on the hot path: `try_enqueue`
//! hands the value back and `try_dequeue` returns `None`. The types below are
//! what the outer surfaces (order queue, worker pool) report to callers.

use std::time::Duration;
use thiserror::Error;

/// Failures of a bounded queue operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Enqueue rejected, queue at capacity
    #[error("queue full (capacity {capacity})")]
    Full { capacity: usize },

    /// Dequeue found nothing
    #[error("queue empty")]
    Empty,

    /// Bounded wait exceeded
    #[error("queue wait timed out after {0:?}")]
    Timeout(Duration),
}

/// Which identifier field failed to pack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierField {
    OrderId,
    ClientOrderId,
}

impl std::fmt::Display for IdentifierField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifierField::OrderId => write!(f, "order_id"),
            IdentifierField::ClientOrderId => write!(f, "client_order_id"),
        }
    }
}

/// Errors from encoding or decoding an order record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Quantity or price is negative, too precise or too large
    #[error("{field} {value} cannot be represented with 9 fixed decimals")]
    InvalidDecimal { field: &'static str, value: String },

    /// Identifier contains a character outside `0-9A-Za-z-_`
    #[error("{field} contains unsupported character {ch:?}")]
    InvalidIdentifier { field: IdentifierField, ch: char },

    /// Enum code not recognised (strict decoding, or any unknown side)
    #[error("unknown {field} code {code}")]
    UnknownCode { field: &'static str, code: u64 },
}

/// Errors surfaced by the order-ingestion queue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Errors delivered through a task's completion handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Every queue tier was full; the pool's backpressure signal
    #[error("all queues full, submission rejected")]
    AllQueuesFull,

    /// The task handler returned an error
    #[error("task execution failed: {0}")]
    TaskExecution(String),

    /// The worker executing the task terminated unexpectedly
    #[error("worker {worker} crashed while holding the task")]
    WorkerCrash { worker: usize },

    /// Waiting for the result exceeded the caller's bound
    #[error("timed out after {0:?} waiting for task result")]
    Timeout(Duration),

    /// The pool no longer accepts or executes work
    #[error("pool is shutting down")]
    ShuttingDown,

    /// Pinned submission named a worker that does not exist
    #[error("no worker with id {0}")]
    UnknownWorker(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_error_display() {
        let err = QueueError::Full { capacity: 1024 };
        assert!(err.to_string().contains("1024"));
        assert_eq!(QueueError::Empty.to_string(), "queue empty");
    }

    #[test]
    fn test_ingest_error_from_codec() {
        let codec = CodecError::UnknownCode { field: "side", code: 9 };
        let err: IngestError = codec.clone().into();
        assert_eq!(err, IngestError::Codec(codec));
        assert!(err.to_string().contains("side"));
    }

    #[test]
    fn test_pool_error_display() {
        let msg = PoolError::WorkerCrash { worker: 3 }.to_string();
        assert!(msg.contains("worker 3"));

        let msg = PoolError::TaskExecution("boom".into()).to_string();
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_identifier_error_names_field() {
        let err = CodecError::InvalidIdentifier {
            field: IdentifierField::ClientOrderId,
            ch: '#',
        };
        assert!(err.to_string().contains("client_order_id"));
    }
}
