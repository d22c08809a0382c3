//! Concurrency tests for the bounded MPMC ring buffer
//!
//! These tests verify:
//! 1. `len()` stays within [0, capacity] under contention and ends at enq - deq
//! 2. Consumers never observe a partially written record
//! 3. A batch of C + k into an empty capacity-C queue enqueues exactly C
//! 4. Single-producer single-consumer order is FIFO
//! 5. Blocking dequeue wakes on enqueue and times out when nothing arrives

use strata_core::codec::{OrderRecord, RECORD_WORDS};
use strata_core::ring::RingBuffer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Record whose words are all derived from its first word
fn self_checking(seed: u64) -> OrderRecord {
    let mut words = [seed; RECORD_WORDS];
    for (i, w) in words.iter_mut().enumerate().skip(1) {
        *w = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(i as u32 * 5) ^ i as u64;
    }
    OrderRecord::from_words(words)
}

fn is_intact(record: &OrderRecord) -> bool {
    *record == self_checking(record.words()[0])
}

/// Test: size stays bounded and balances under 4 producers + 4 consumers
#[test]
fn test_size_invariant_under_contention() {
    const CAPACITY: usize = 64;
    const PER_PRODUCER: u64 = 20_000;

    let ring = Arc::new(RingBuffer::<u64>::new(CAPACITY));
    let enqueued = Arc::new(AtomicU64::new(0));
    let dequeued = Arc::new(AtomicU64::new(0));
    let done = Arc::new(AtomicBool::new(false));
    let violations = Arc::new(AtomicU64::new(0));

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let ring = Arc::clone(&ring);
            let enqueued = Arc::clone(&enqueued);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    if ring.try_enqueue(p * PER_PRODUCER + i).is_ok() {
                        enqueued.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let ring = Arc::clone(&ring);
            let dequeued = Arc::clone(&dequeued);
            let done = Arc::clone(&done);
            let violations = Arc::clone(&violations);
            thread::spawn(move || loop {
                if ring.len() > CAPACITY {
                    violations.fetch_add(1, Ordering::Relaxed);
                }
                match ring.try_dequeue() {
                    Some(_) => {
                        dequeued.fetch_add(1, Ordering::Relaxed);
                    }
                    None if done.load(Ordering::Acquire) => break,
                    None => thread::yield_now(),
                }
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    // Let consumers drain part of the tail before stopping them
    thread::sleep(Duration::from_millis(10));
    done.store(true, Ordering::Release);
    for c in consumers {
        c.join().unwrap();
    }

    assert_eq!(violations.load(Ordering::Relaxed), 0, "len() exceeded capacity");
    let enq = enqueued.load(Ordering::Relaxed);
    let deq = dequeued.load(Ordering::Relaxed);
    assert_eq!(ring.len() as u64, enq - deq, "final size must equal enq - deq");
    assert_eq!(ring.producers_in_flight(), 0);
    assert_eq!(ring.consumers_in_flight(), 0);
}

/// Test: no torn records with 4 producers and 4 consumers on a small ring
#[test]
fn test_no_partial_records_observed() {
    const PER_PRODUCER: u64 = 10_000;

    let ring = Arc::new(RingBuffer::<OrderRecord>::new(16));
    let barrier = Arc::new(Barrier::new(8));
    let remaining = Arc::new(AtomicU64::new(4 * PER_PRODUCER));
    let torn = Arc::new(AtomicU64::new(0));

    let mut threads = Vec::new();
    for p in 0..4u64 {
        let ring = Arc::clone(&ring);
        let barrier = Arc::clone(&barrier);
        threads.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..PER_PRODUCER {
                let mut record = self_checking(p << 32 | i);
                loop {
                    match ring.try_enqueue(record) {
                        Ok(()) => break,
                        Err(back) => {
                            record = back;
                            thread::yield_now();
                        }
                    }
                }
            }
        }));
    }
    for _ in 0..4 {
        let ring = Arc::clone(&ring);
        let barrier = Arc::clone(&barrier);
        let remaining = Arc::clone(&remaining);
        let torn = Arc::clone(&torn);
        threads.push(thread::spawn(move || {
            barrier.wait();
            while remaining.load(Ordering::Acquire) > 0 {
                if let Some(record) = ring.blocking_dequeue(Duration::from_millis(5)) {
                    if !is_intact(&record) {
                        torn.fetch_add(1, Ordering::Relaxed);
                    }
                    remaining.fetch_sub(1, Ordering::AcqRel);
                }
            }
        }));
    }
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(torn.load(Ordering::Relaxed), 0, "observed a partially written record");
    assert!(ring.is_empty());
    assert_eq!(ring.sequence(), 4 * PER_PRODUCER);
}

/// Test: batch of C + k into an empty capacity-C queue
#[test]
fn test_batch_capacity_boundary() {
    const C: usize = 32;
    const K: usize = 7;

    let ring = RingBuffer::new(C);
    let result = ring.enqueue_batch(0..(C + K));

    assert_eq!(result.enqueued, C);
    assert_eq!(result.failed(), K);
    assert_eq!(result.rejected, (C..C + K).collect::<Vec<_>>());
    assert!(ring.is_full());
    assert_eq!(ring.len(), C);
}

/// Test: SPSC enqueue 50, dequeue 25 yields the first 25 in order
#[test]
fn test_spsc_fifo() {
    let ring = Arc::new(RingBuffer::new(64));

    let producer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            for i in 0..50u32 {
                ring.try_enqueue(i).unwrap();
            }
        })
    };
    producer.join().unwrap();

    let consumer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            (0..25)
                .map(|_| ring.try_dequeue().unwrap())
                .collect::<Vec<_>>()
        })
    };
    let got = consumer.join().unwrap();

    assert_eq!(got, (0..25).collect::<Vec<_>>());
    assert_eq!(ring.len(), 25);
}

/// Test: many laps through a tiny ring keep FIFO order
#[test]
fn test_spsc_fifo_across_laps() {
    let ring = Arc::new(RingBuffer::new(3));
    let consumer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            let mut expected = 0u64;
            while expected < 10_000 {
                if let Some(v) = ring.blocking_dequeue(Duration::from_secs(5)) {
                    assert_eq!(v, expected, "out of order");
                    expected += 1;
                }
            }
        })
    };
    for i in 0..10_000u64 {
        ring.blocking_enqueue(i, Duration::from_secs(5)).unwrap();
    }
    consumer.join().unwrap();
}

/// Test: a parked consumer is woken by an enqueue well before its timeout
#[test]
fn test_blocking_dequeue_wakes_on_enqueue() {
    let ring = Arc::new(RingBuffer::new(4));
    let consumer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            let start = Instant::now();
            let v = ring.blocking_dequeue(Duration::from_secs(5));
            (v, start.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(20));
    ring.try_enqueue(99).unwrap();

    let (value, waited) = consumer.join().unwrap();
    assert_eq!(value, Some(99));
    assert!(waited < Duration::from_secs(1), "consumer slept through the wake");
}

/// Test: blocking dequeue on an empty queue returns None after the timeout
#[test]
fn test_blocking_dequeue_timeout() {
    let ring = RingBuffer::<u8>::new(4);
    let start = Instant::now();
    assert_eq!(ring.blocking_dequeue(Duration::from_millis(20)), None);
    assert!(start.elapsed() >= Duration::from_millis(20));
}

/// Test: dropping a ring drops the values still queued
#[test]
fn test_drop_releases_queued_values() {
    let marker = Arc::new(());
    {
        let ring = RingBuffer::new(8);
        for _ in 0..5 {
            ring.try_enqueue(Arc::clone(&marker)).unwrap();
        }
        assert_eq!(Arc::strong_count(&marker), 6);
    }
    assert_eq!(Arc::strong_count(&marker), 1);
}
