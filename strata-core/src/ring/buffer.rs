//! Bounded lock-free MPMC ring buffer
//!
//! Fixed array of slots, each carrying a payload and an atomic completion
//! marker. Head and tail are monotonic positions claimed by CAS; the slot
//! index is `position % lap` where `lap` is the slot count.
//!
//! ## Slot protocol
//!
//! ```text
//!  marker == pos        slot free for the producer claiming `pos`
//!  marker == pos + 1    payload published for the consumer claiming `pos`
//!  marker == pos + lap  cleared, free for the producer of the next lap
//!
//!  producer:  load tail ─► marker == tail? ─► CAS tail ─► write payload ─► marker = tail+1 (Release)
//!  consumer:  load head ─► marker == head+1? (Acquire) ─► CAS head ─► read payload ─► marker = head+lap
//! ```
//!
//! The marker doubles as a generation stamp: a stale producer or consumer
//! from an earlier lap can never match it, so slot reuse is ABA-free no
//! matter how many threads contend relative to capacity. Full and empty are
//! decided by the marker alone. A capacity of 1 still gets two slots so the
//! "published" and "next lap" markers never coincide; the extra slot is never
//! filled.
//!
//! Depth is `tail - head` read as a consistent pair, so it always lies in
//! `0..=capacity`. It counts claimed positions: an item a producer has
//! claimed but not yet published is included, one a consumer has claimed is
//! not.
//!
//! Full and empty are ordinary return values. `try_enqueue` hands the value
//! back on failure and never blocks; `try_dequeue` returns `None`.

use super::notify::Parker;
use crossbeam_utils::{Backoff, CachePadded};
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Longest single park inside a blocking call; the waiter re-checks after it.
pub const PARK_SLICE: Duration = Duration::from_millis(1);

struct Slot<T> {
    marker: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Outcome of [`RingBuffer::enqueue_batch`]
#[derive(Debug)]
pub struct BatchPush<T> {
    /// Items published before the first failure
    pub enqueued: usize,
    /// The failed item and everything after it, in input order
    pub rejected: Vec<T>,
}

impl<T> BatchPush<T> {
    pub fn failed(&self) -> usize {
        self.rejected.len()
    }

    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Bounded multi-producer multi-consumer queue
pub struct RingBuffer<T> {
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    sequence: CachePadded<AtomicU64>,
    producers_in_flight: AtomicUsize,
    consumers_in_flight: AtomicUsize,
    slots: Box<[Slot<T>]>,
    capacity: usize,
    /// Slot count; `capacity.max(2)`
    lap: usize,
    not_empty: Parker,
    not_full: Parker,
}

unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Create a ring buffer holding at most `capacity` items.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be > 0");

        let lap = capacity.max(2);
        let slots = (0..lap)
            .map(|i| Slot {
                marker: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            sequence: CachePadded::new(AtomicU64::new(0)),
            producers_in_flight: AtomicUsize::new(0),
            consumers_in_flight: AtomicUsize::new(0),
            slots,
            capacity,
            lap,
            not_empty: Parker::new(),
            not_full: Parker::new(),
        }
    }

    /// Publish `value` at the tail, or hand it back if the queue is full.
    #[inline]
    pub fn try_enqueue(&self, value: T) -> Result<(), T> {
        let backoff = Backoff::new();
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            // Capacity 1 only: the spare slot must stay empty
            if self.lap > self.capacity {
                let occupied = tail.wrapping_sub(self.head.load(Ordering::SeqCst)) as isize;
                if occupied < 0 {
                    // Head moved past our stale tail
                    backoff.spin();
                    continue;
                }
                if occupied as usize >= self.capacity {
                    return Err(value);
                }
            }

            let slot = &self.slots[tail % self.lap];
            let marker = slot.marker.load(Ordering::Acquire);
            let lag = (marker as isize).wrapping_sub(tail as isize);

            if lag == 0 {
                if self
                    .tail
                    .compare_exchange_weak(
                        tail,
                        tail.wrapping_add(1),
                        Ordering::SeqCst,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    self.producers_in_flight.fetch_add(1, Ordering::Relaxed);
                    // SAFETY: winning the CAS for `tail` while the marker equals
                    // `tail` gives this thread exclusive ownership of the slot.
                    unsafe { (*slot.value.get()).write(value) };
                    slot.marker.store(tail.wrapping_add(1), Ordering::Release);
                    self.producers_in_flight.fetch_sub(1, Ordering::Relaxed);

                    self.sequence.fetch_add(1, Ordering::Relaxed);
                    self.not_empty.notify_one();
                    return Ok(());
                }
                backoff.spin();
            } else if lag < 0 {
                // Slot still holds the previous lap's item
                return Err(value);
            } else {
                // Another producer advanced tail under us
                backoff.spin();
            }
        }
    }

    /// Take the item at the head, if one is published.
    #[inline]
    pub fn try_dequeue(&self) -> Option<T> {
        let backoff = Backoff::new();
        loop {
            let head = self.head.load(Ordering::Relaxed);
            let slot = &self.slots[head % self.lap];
            let marker = slot.marker.load(Ordering::Acquire);
            let published = head.wrapping_add(1);
            let lag = (marker as isize).wrapping_sub(published as isize);

            if lag == 0 {
                if self
                    .head
                    .compare_exchange_weak(head, published, Ordering::SeqCst, Ordering::Relaxed)
                    .is_ok()
                {
                    self.consumers_in_flight.fetch_add(1, Ordering::Relaxed);
                    // SAFETY: the Acquire load saw the producer's Release store of
                    // `head + 1`, and winning the CAS makes this the only reader.
                    let value = unsafe { (*slot.value.get()).assume_init_read() };
                    slot.marker
                        .store(head.wrapping_add(self.lap), Ordering::Release);
                    self.consumers_in_flight.fetch_sub(1, Ordering::Relaxed);

                    self.not_full.notify_one();
                    return Some(value);
                }
                backoff.spin();
            } else if lag < 0 {
                // Empty, or claimed by a producer that has not published yet
                return None;
            } else {
                backoff.spin();
            }
        }
    }

    /// Enqueue items in order, stopping at the first failure.
    pub fn enqueue_batch<I>(&self, items: I) -> BatchPush<T>
    where
        I: IntoIterator<Item = T>,
    {
        let mut iter = items.into_iter();
        let mut enqueued = 0;

        while let Some(item) = iter.next() {
            if let Err(item) = self.try_enqueue(item) {
                let mut rejected = vec![item];
                rejected.extend(iter);
                return BatchPush { enqueued, rejected };
            }
            enqueued += 1;
        }

        BatchPush {
            enqueued,
            rejected: Vec::new(),
        }
    }

    /// Dequeue up to `max` items, stopping at the first empty read.
    pub fn dequeue_batch(&self, max: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(max.min(self.len()));
        while out.len() < max {
            match self.try_dequeue() {
                Some(item) => out.push(item),
                None => break,
            }
        }
        out
    }

    /// Dequeue, waiting up to `timeout` for an item to arrive.
    ///
    /// Spins and yields briefly, then parks until the queue looks non-empty,
    /// in slices of at most [`PARK_SLICE`], re-checking after every wake.
    pub fn blocking_dequeue(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let backoff = Backoff::new();
        loop {
            if let Some(item) = self.try_dequeue() {
                return Some(item);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            if !backoff.is_completed() {
                backoff.snooze();
                continue;
            }
            let slice = (deadline - now).min(PARK_SLICE);
            self.not_empty.park_unless(|| !self.is_empty(), slice);
        }
    }

    /// Enqueue, waiting up to `timeout` for space. Hands the value back on timeout.
    pub fn blocking_enqueue(&self, value: T, timeout: Duration) -> Result<(), T> {
        let deadline = Instant::now() + timeout;
        let backoff = Backoff::new();
        let mut value = value;
        loop {
            match self.try_enqueue(value) {
                Ok(()) => return Ok(()),
                Err(v) => value = v,
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(value);
            }
            if !backoff.is_completed() {
                backoff.snooze();
                continue;
            }
            let slice = (deadline - now).min(PARK_SLICE);
            self.not_full.park_unless(|| !self.is_full(), slice);
        }
    }

    /// Park the calling thread until the queue is non-empty, a wake is
    /// signalled, or `timeout` passes. Does not consume anything.
    ///
    /// Returns true if an item is visible on return.
    pub fn wait_for_item(&self, timeout: Duration) -> bool {
        if !self.is_empty() {
            return true;
        }
        self.not_empty.park_unless(|| !self.is_empty(), timeout);
        !self.is_empty()
    }

    /// Wake every thread parked waiting for items (used to deliver out-of-band
    /// commands to a worker idling on this queue).
    pub fn wake_consumers(&self) {
        self.not_empty.notify_all();
    }

    /// Claimed, unconsumed positions; always within `0..=capacity`
    #[inline]
    pub fn len(&self) -> usize {
        loop {
            let tail = self.tail.load(Ordering::SeqCst);
            let head = self.head.load(Ordering::SeqCst);
            // Head never passes tail, so a stable tail makes the pair consistent
            if self.tail.load(Ordering::SeqCst) == tail {
                return tail.wrapping_sub(head).min(self.capacity);
            }
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of items ever published
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Producers that have claimed a slot but not yet published it
    pub fn producers_in_flight(&self) -> usize {
        self.producers_in_flight.load(Ordering::Relaxed)
    }

    /// Consumers that have claimed a slot but not yet cleared it
    pub fn consumers_in_flight(&self) -> usize {
        self.consumers_in_flight.load(Ordering::Relaxed)
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        while self.try_dequeue().is_some() {}
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("sequence", &self.sequence())
            .finish()
    }
}
