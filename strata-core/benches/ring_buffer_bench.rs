//! Ring Buffer Benchmarks
//!
//! ## Operations Tested
//!
//! 1. **Uncontended** - enqueue/dequeue pair on one thread
//! 2. **Batch** - enqueue_batch / dequeue_batch of 64 items
//! 3. **Codec** - encode and decode of a full order record
//! 4. **Contended** - 2 producers / 2 consumers moving 100k items

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;
use strata_core::codec::{OrderRecord, RecordCodec, SymbolCache};
use strata_core::core::{Order, Side};
use strata_core::ring::{OrderQueue, RingBuffer};

fn uncontended_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring/uncontended");

    let ring = RingBuffer::<u64>::new(1024);
    group.bench_function("enqueue_dequeue_u64", |b| {
        b.iter(|| {
            let _ = ring.try_enqueue(black_box(42));
            black_box(ring.try_dequeue())
        });
    });

    let records = RingBuffer::<OrderRecord>::new(1024);
    let record = OrderRecord::default();
    group.bench_function("enqueue_dequeue_record", |b| {
        b.iter(|| {
            let _ = records.try_enqueue(black_box(record));
            black_box(records.try_dequeue())
        });
    });

    group.finish();
}

fn batch_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring/batch");
    group.throughput(Throughput::Elements(64));

    let ring = RingBuffer::<u64>::new(1024);
    group.bench_function("batch_64", |b| {
        b.iter(|| {
            let pushed = ring.enqueue_batch(0..64u64);
            black_box(pushed.enqueued);
            black_box(ring.dequeue_batch(64))
        });
    });

    group.finish();
}

fn codec_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring/codec");

    let codec = RecordCodec::new(Arc::new(SymbolCache::new(64)));
    let order = Order::limit("BTC-USD", Side::Buy, dec!(0.125), dec!(65000.5), "LIGHTER", "ORD-1234567890")
        .with_client_order_id("cli-42");
    let record = codec.encode(&order).unwrap();

    group.bench_function("encode", |b| {
        b.iter(|| black_box(codec.encode(black_box(&order))))
    });
    group.bench_function("decode", |b| {
        b.iter(|| black_box(codec.decode(black_box(&record))))
    });

    let queue = OrderQueue::new(1024, 64);
    group.bench_function("push_pop_order", |b| {
        b.iter(|| {
            let _ = queue.push(black_box(&order));
            black_box(queue.pop())
        })
    });

    group.finish();
}

fn contended_bench(c: &mut Criterion) {
    const ITEMS: u64 = 100_000;

    let mut group = c.benchmark_group("ring/contended");
    group.sample_size(20).throughput(Throughput::Elements(ITEMS));

    group.bench_function("2p2c_100k", |b| {
        b.iter(|| {
            let ring = Arc::new(RingBuffer::<u64>::new(4096));
            let producers: Vec<_> = (0..2)
                .map(|_| {
                    let ring = Arc::clone(&ring);
                    thread::spawn(move || {
                        for i in 0..ITEMS / 2 {
                            let mut v = i;
                            while let Err(back) = ring.try_enqueue(v) {
                                v = back;
                                std::hint::spin_loop();
                            }
                        }
                    })
                })
                .collect();
            let consumers: Vec<_> = (0..2)
                .map(|_| {
                    let ring = Arc::clone(&ring);
                    thread::spawn(move || {
                        let mut n = 0;
                        while n < ITEMS / 2 {
                            if ring.try_dequeue().is_some() {
                                n += 1;
                            } else {
                                std::hint::spin_loop();
                            }
                        }
                    })
                })
                .collect();
            for t in producers.into_iter().chain(consumers) {
                t.join().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    uncontended_bench,
    batch_bench,
    codec_bench,
    contended_bench
);
criterion_main!(benches);
