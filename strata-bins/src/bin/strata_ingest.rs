//! Order-ingestion throughput run
//!
//! N producer threads encode synthetic orders into one shared `OrderQueue`
//! while M consumer threads decode them. Prints throughput and symbol-cache
//! hit rate on exit (or on Ctrl+C).

use anyhow::Result;
use clap::Parser;
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strata_bins::common::{self, CommonArgs};
use strata_core::core::{IngestError, Order, QueueError, Side};
use strata_core::ring::OrderQueue;
use tracing::{info, warn};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const SYMBOLS: [&str; 4] = ["BTC-USD", "ETH-USD", "SOL-USD", "AVAX-USD"];

#[derive(Parser, Debug)]
#[command(name = "strata-ingest")]
#[command(about = "Multi-producer order ingestion through the lock-free ring", long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Producer threads
    #[arg(short, long, default_value_t = 4)]
    producers: usize,

    /// Consumer threads
    #[arg(long, default_value_t = 2)]
    consumers: usize,

    /// Orders per producer
    #[arg(short, long, default_value_t = 250_000)]
    orders: u64,
}

fn synthetic_order(rng: &mut impl Rng, producer: usize, seq: u64) -> Order {
    let symbol = SYMBOLS[rng.gen_range(0..SYMBOLS.len())];
    let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
    // Quantity in 0.001 lots, price in cents
    let quantity = Decimal::new(rng.gen_range(1..10_000), 3);
    let price = Decimal::new(rng.gen_range(1_000_000..5_000_000), 2);
    Order::limit(
        symbol,
        side,
        quantity,
        price,
        "SIM",
        format!("P{}-{}", producer, seq),
    )
}

fn main() -> Result<()> {
    let args = Args::parse();
    common::init_logging(&args.common.log_level, args.common.json_logs)?;
    strata_core::resilience::install_panic_handler();
    common::setup_performance(args.common.cpu_core, args.common.realtime)?;

    let config = common::load_config(args.common.config.as_deref())?;
    let stop = common::install_stop_flag()?;

    info!(
        producers = args.producers,
        consumers = args.consumers,
        orders = args.orders,
        capacity = config.ring_capacity,
        "Starting ingestion run"
    );

    let queue = Arc::new(OrderQueue::new(
        config.ring_capacity,
        config.symbol_cache_capacity,
    ));
    let produced = Arc::new(AtomicU64::new(0));
    let consumed = Arc::new(AtomicU64::new(0));
    let full_spins = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let producers: Vec<_> = (0..args.producers)
        .map(|p| {
            let queue = Arc::clone(&queue);
            let produced = Arc::clone(&produced);
            let full_spins = Arc::clone(&full_spins);
            let stop = Arc::clone(&stop);
            let orders = args.orders;
            thread::Builder::new()
                .name(format!("strata-producer-{}", p))
                .spawn(move || -> Result<()> {
                    let mut rng = rand::thread_rng();
                    for seq in 0..orders {
                        let order = synthetic_order(&mut rng, p, seq);
                        loop {
                            if stop.load(Ordering::Acquire) {
                                return Ok(());
                            }
                            match queue.push(&order) {
                                Ok(()) => break,
                                Err(IngestError::Queue(QueueError::Full { .. })) => {
                                    full_spins.fetch_add(1, Ordering::Relaxed);
                                    thread::yield_now();
                                }
                                Err(e) => return Err(e.into()),
                            }
                        }
                        produced.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(())
                })
        })
        .collect::<std::io::Result<_>>()?;

    let total = args.orders * args.producers as u64;
    let consumers: Vec<_> = (0..args.consumers)
        .map(|c| {
            let queue = Arc::clone(&queue);
            let consumed = Arc::clone(&consumed);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name(format!("strata-consumer-{}", c))
                .spawn(move || {
                    let mut notional = Decimal::ZERO;
                    while consumed.load(Ordering::Relaxed) < total && !stop.load(Ordering::Acquire)
                    {
                        match queue.pop_timeout(Duration::from_millis(50)) {
                            Ok(order) => {
                                notional += order.quantity * order.price;
                                consumed.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(IngestError::Queue(QueueError::Timeout(_))) => {}
                            Err(e) => warn!("Consumer {} dropped a record: {}", c, e),
                        }
                    }
                    notional
                })
        })
        .collect::<std::io::Result<_>>()?;

    for p in producers {
        match p.join() {
            Ok(result) => result?,
            Err(_) => warn!("Producer thread panicked"),
        }
    }
    let mut notional = Decimal::ZERO;
    for c in consumers {
        match c.join() {
            Ok(n) => notional += n,
            Err(_) => warn!("Consumer thread panicked"),
        }
    }

    let elapsed = start.elapsed();
    let produced = produced.load(Ordering::Relaxed);
    let consumed = consumed.load(Ordering::Relaxed);
    let (hits, misses) = queue.codec().symbols().hit_stats();

    println!("\n=== Ingestion Summary ===");
    println!("Produced:        {}", produced);
    println!("Consumed:        {}", consumed);
    println!("Elapsed:         {:.3}s", elapsed.as_secs_f64());
    println!("Throughput:      {:.0} orders/s", common::rate(consumed, elapsed));
    println!("Full retries:    {}", full_spins.load(Ordering::Relaxed));
    println!("Symbol cache:    {} hits / {} misses", hits, misses);
    println!("Notional:        {}", notional);

    if stop.load(Ordering::Acquire) {
        warn!("Interrupted, {} orders left in the ring", queue.len());
    }
    Ok(())
}
