//! Order-ingestion queue
//!
//! A [`RingBuffer`] of fixed-width [`OrderRecord`]s fronted by a
//! [`RecordCodec`]. Producers encode on their own thread before claiming a
//! slot; consumers decode after releasing it, so the critical section of the
//! ring never touches strings or decimals.

use super::buffer::{BatchPush, RingBuffer};
use crate::codec::{OrderRecord, RecordCodec, SymbolCache};
use crate::core::{IngestError, Order, QueueError};
use std::sync::Arc;
use std::time::Duration;

pub struct OrderQueue {
    ring: RingBuffer<OrderRecord>,
    codec: RecordCodec,
}

impl OrderQueue {
    /// Queue with its own symbol cache
    pub fn new(capacity: usize, symbol_cache_capacity: usize) -> Self {
        Self::with_codec(
            capacity,
            RecordCodec::new(Arc::new(SymbolCache::new(symbol_cache_capacity))),
        )
    }

    /// Queue sharing an existing codec (and its symbol cache)
    pub fn with_codec(capacity: usize, codec: RecordCodec) -> Self {
        Self {
            ring: RingBuffer::new(capacity),
            codec,
        }
    }

    /// Encode and enqueue without blocking
    pub fn push(&self, order: &Order) -> Result<(), IngestError> {
        let record = self.codec.encode(order)?;
        self.push_record(record)
    }

    /// Enqueue an already-encoded record
    #[inline]
    pub fn push_record(&self, record: OrderRecord) -> Result<(), IngestError> {
        self.ring.try_enqueue(record).map_err(|_| {
            IngestError::Queue(QueueError::Full {
                capacity: self.ring.capacity(),
            })
        })
    }

    /// Encode every order, then enqueue in order until the ring is full.
    ///
    /// Returns the number enqueued. An encoding failure aborts before anything
    /// is published.
    pub fn push_batch(&self, orders: &[Order]) -> Result<usize, IngestError> {
        let records = orders
            .iter()
            .map(|o| self.codec.encode(o))
            .collect::<Result<Vec<_>, _>>()?;
        let BatchPush { enqueued, .. } = self.ring.enqueue_batch(records);
        Ok(enqueued)
    }

    /// Dequeue and decode without blocking
    pub fn pop(&self) -> Result<Order, IngestError> {
        let record = self.ring.try_dequeue().ok_or(QueueError::Empty)?;
        Ok(self.codec.decode(&record)?)
    }

    /// Dequeue and decode, waiting up to `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Order, IngestError> {
        let record = self
            .ring
            .blocking_dequeue(timeout)
            .ok_or(QueueError::Timeout(timeout))?;
        Ok(self.codec.decode(&record)?)
    }

    /// Dequeue up to `max` raw records
    pub fn pop_records(&self, max: usize) -> Vec<OrderRecord> {
        self.ring.dequeue_batch(max)
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    pub fn ring(&self) -> &RingBuffer<OrderRecord> {
        &self.ring
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}
