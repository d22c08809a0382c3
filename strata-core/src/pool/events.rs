//! Pool lifecycle events
//!
//! Observers call [`WorkerPool::subscribe`](super::WorkerPool::subscribe) and
//! receive a bounded channel. Publishing never blocks the control thread: a
//! full subscriber misses events, a disconnected one is pruned.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// Worker thread is up and serving its queue
    WorkerReady { worker: usize },
    /// Worker thread terminated unexpectedly
    WorkerCrashed { worker: usize },
    /// Replacement thread spawned for a crashed worker
    WorkerRestarted { worker: usize, restarts: u64 },
    /// Tasks moved from `donor` to `requester`
    StealCompleted {
        donor: usize,
        requester: usize,
        tasks: usize,
    },
    /// Periodic per-worker progress
    WorkerStats {
        worker: usize,
        processed: u64,
        failed: u64,
    },
}

pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Sender<PoolEvent>>>,
    capacity: usize,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn subscribe(&self) -> Receiver<PoolEvent> {
        let (tx, rx) = channel::bounded(self.capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    pub(crate) fn publish(&self, event: PoolEvent) {
        let mut subs = self.subscribers.lock();
        if subs.is_empty() {
            return;
        }
        subs.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
