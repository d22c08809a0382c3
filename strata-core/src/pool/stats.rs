//! Worker state and pool statistics
//!
//! Each worker slot owns a [`WorkerShared`] that outlives individual worker
//! threads: a replacement worker keeps counting where its predecessor
//! stopped. Counters are written by the owning worker (restarts and crash
//! failures by the control thread) and read by [`WorkerPool::stats`].
//!
//! [`WorkerPool::stats`]: super::WorkerPool::stats

use crossbeam_utils::CachePadded;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Worker lifecycle
///
/// ```text
/// Created ─► Ready ─► Running ─┬─► Idle ◄─┐
///                              └─► Busy ──┘
///                   (any) ─► Stopped | Crashed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum WorkerState {
    Created = 0,
    Ready = 1,
    Running = 2,
    Idle = 3,
    Busy = 4,
    Stopped = 5,
    Crashed = 6,
}

impl WorkerState {
    #[inline]
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Created,
            1 => WorkerState::Ready,
            2 => WorkerState::Running,
            3 => WorkerState::Idle,
            4 => WorkerState::Busy,
            5 => WorkerState::Stopped,
            _ => WorkerState::Crashed,
        }
    }

    /// Thread is alive and serving its queue
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            WorkerState::Ready | WorkerState::Running | WorkerState::Idle | WorkerState::Busy
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Created => "created",
            WorkerState::Ready => "ready",
            WorkerState::Running => "running",
            WorkerState::Idle => "idle",
            WorkerState::Busy => "busy",
            WorkerState::Stopped => "stopped",
            WorkerState::Crashed => "crashed",
        };
        f.write_str(s)
    }
}

/// Per-slot state and counters shared between a worker thread and the pool
#[derive(Debug)]
pub struct WorkerShared {
    state: AtomicU8,
    pub(crate) processed: CachePadded<AtomicU64>,
    pub(crate) failed: CachePadded<AtomicU64>,
    pub(crate) stolen: AtomicU64,
    pub(crate) donated: AtomicU64,
    pub(crate) restarts: AtomicU64,
}

impl WorkerShared {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Created as u8),
            processed: CachePadded::new(AtomicU64::new(0)),
            failed: CachePadded::new(AtomicU64::new(0)),
            stolen: AtomicU64::new(0),
            donated: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn stolen(&self) -> u64 {
        self.stolen.load(Ordering::Relaxed)
    }

    pub fn donated(&self) -> u64 {
        self.donated.load(Ordering::Relaxed)
    }

    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self, id: usize, queue_depth: usize) -> WorkerStats {
        WorkerStats {
            id,
            state: self.state(),
            processed: self.processed(),
            failed: self.failed(),
            stolen: self.stolen(),
            donated: self.donated(),
            queue_depth,
            restarts: self.restarts(),
        }
    }
}

impl Default for WorkerShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool-level submission counters
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    /// Accepted into some queue
    pub submitted: CachePadded<AtomicU64>,
    /// Refused at submission
    pub rejected: AtomicU64,
    /// Accepted, then resolved without running (redistribution or shutdown)
    pub dropped: AtomicU64,
}

/// Point-in-time view of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub id: usize,
    pub state: WorkerState,
    pub processed: u64,
    pub failed: u64,
    pub stolen: u64,
    pub donated: u64,
    pub queue_depth: usize,
    pub restarts: u64,
}

/// Point-in-time view of the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub workers: Vec<WorkerStats>,
    pub active_workers: usize,
    pub total_workers: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
    pub dropped: u64,
    pub pending: u64,
    pub overflow_depth: usize,
    pub work_stealing: bool,
}

impl PoolStats {
    pub(crate) fn collect(
        workers: Vec<WorkerStats>,
        counters: &PoolCounters,
        overflow_depth: usize,
        work_stealing: bool,
    ) -> Self {
        let completed = workers.iter().map(|w| w.processed).sum::<u64>();
        let failed = workers.iter().map(|w| w.failed).sum::<u64>();
        let submitted = counters.submitted.load(Ordering::Acquire);
        let dropped = counters.dropped.load(Ordering::Acquire);
        let active_workers = workers.iter().filter(|w| w.state.is_active()).count();

        Self {
            total_workers: workers.len(),
            active_workers,
            submitted,
            completed,
            failed,
            rejected: counters.rejected.load(Ordering::Relaxed),
            dropped,
            pending: submitted.saturating_sub(completed + failed + dropped),
            overflow_depth,
            work_stealing,
            workers,
        }
    }

    /// Every accepted task has been resolved
    pub fn is_drained(&self) -> bool {
        self.pending == 0
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
