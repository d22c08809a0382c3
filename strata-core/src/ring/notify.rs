//! Futex-like parking for threads waiting on a ring buffer counter
//!
//! Waiters register, re-check their condition under the lock and sleep on a
//! `parking_lot::Condvar` for a bounded sub-timeout. Notifiers skip the lock
//! entirely when nobody is registered, so the uncontended enqueue/dequeue
//! path costs one SeqCst load.
//!
//! ```text
//! waiter:   waiters += 1 ─► lock ─► still empty? ─► wait_for(sub) ─► waiters -= 1
//! notifier: tail += 1 ────► waiters > 0? ─► lock ─► notify_one
//! ```
//!
//! The SeqCst increment on `waiters` and the SeqCst update of the watched
//! counter pair up: either the notifier sees the waiter, or the waiter sees
//! the new counter value before sleeping.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct Parker {
    lock: Mutex<()>,
    cond: Condvar,
    waiters: AtomicUsize,
}

impl Parker {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Park until notified, the sub-timeout elapses, or `ready()` is already
    /// true once the waiter is registered.
    ///
    /// Returns true if woken by a notification.
    pub fn park_unless<F: Fn() -> bool>(&self, ready: F, timeout: Duration) -> bool {
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.lock.lock();
        let woken = if ready() {
            false
        } else {
            !self.cond.wait_for(&mut guard, timeout).timed_out()
        };
        drop(guard);
        self.waiters.fetch_sub(1, Ordering::SeqCst);
        woken
    }

    /// Wake one parked thread, if any
    #[inline]
    pub fn notify_one(&self) {
        if self.waiters.load(Ordering::SeqCst) > 0 {
            let _guard = self.lock.lock();
            self.cond.notify_one();
        }
    }

    /// Wake every parked thread
    pub fn notify_all(&self) {
        if self.waiters.load(Ordering::SeqCst) > 0 {
            let _guard = self.lock.lock();
            self.cond.notify_all();
        }
    }

    /// Number of threads currently registered as waiting
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }
}

impl Default for Parker {
    fn default() -> Self {
        Self::new()
    }
}
