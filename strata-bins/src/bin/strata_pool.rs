//! Worker-pool run over encoded orders
//!
//! Submits a burst of `OrderRecord`s to a `WorkerPool` whose handler decodes
//! each record and prices it. `--skew` routes everything to worker 0 so work
//! stealing has something to do; `--crash-every` makes the handler panic
//! periodically to exercise supervision.

use anyhow::{bail, Result};
use clap::Parser;
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_bins::common::{self, CommonArgs};
use strata_core::codec::{OrderRecord, RecordCodec, SymbolCache};
use strata_core::core::{Order, PoolError, Side};
use strata_core::pool::{PoolEvent, Task, TaskHandler, WorkerPool};
use tracing::{info, warn};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const PRICE: u32 = 0;
const CRASH: u32 = 1;

#[derive(Parser, Debug)]
#[command(name = "strata-pool")]
#[command(about = "Price a burst of encoded orders on the worker pool", long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of orders to submit
    #[arg(short = 'n', long, default_value_t = 100_000)]
    tasks: u64,

    /// Override the configured worker count
    #[arg(short, long)]
    workers: Option<usize>,

    /// Send every order to worker 0
    #[arg(long)]
    skew: bool,

    /// Panic in the handler on every Nth order (0 = never)
    #[arg(long, default_value_t = 0)]
    crash_every: u64,

    /// Seconds to wait for the pool to drain
    #[arg(long, default_value_t = 10)]
    drain_secs: u64,
}

/// Decodes a record and returns its notional value
struct NotionalHandler {
    codec: RecordCodec,
}

impl TaskHandler for NotionalHandler {
    type Input = OrderRecord;
    type Output = Decimal;

    fn execute(&self, task: Task<OrderRecord>) -> Result<Decimal> {
        if task.kind == CRASH {
            panic!("injected crash on {}", task.id);
        }
        let order = self.codec.decode(&task.data)?;
        if order.quantity.is_zero() {
            bail!("order {} has zero quantity", order.order_id);
        }
        Ok(order.quantity * order.price)
    }

    fn name(&self) -> &'static str {
        "notional"
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    common::init_logging(&args.common.log_level, args.common.json_logs)?;
    strata_core::resilience::install_panic_handler();
    common::setup_performance(args.common.cpu_core, args.common.realtime)?;

    let mut config = common::load_config(args.common.config.as_deref())?;
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    let stop = common::install_stop_flag()?;

    let symbols = Arc::new(SymbolCache::new(config.symbol_cache_capacity));
    let codec = RecordCodec::new(Arc::clone(&symbols));
    let pool = WorkerPool::new(
        config,
        NotionalHandler {
            codec: codec.clone(),
        },
    )?;
    let events = pool.subscribe();

    info!(
        workers = pool.worker_count(),
        tasks = args.tasks,
        skew = args.skew,
        stealing = pool.is_work_stealing(),
        "Pool started"
    );

    let mut rng = rand::thread_rng();
    let mut handles = Vec::with_capacity(args.tasks as usize);
    let start = Instant::now();
    for i in 0..args.tasks {
        if stop.load(Ordering::Acquire) {
            warn!("Interrupted after {} submissions", i);
            break;
        }
        let order = Order::limit(
            ["BTC-USD", "ETH-USD", "SOL-USD"][rng.gen_range(0..3)],
            if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
            Decimal::new(rng.gen_range(1..1_000), 3),
            Decimal::new(rng.gen_range(100_000..200_000), 2),
            "SIM",
            format!("O{}", i),
        );
        let kind = if args.crash_every > 0 && i > 0 && i % args.crash_every == 0 {
            CRASH
        } else {
            PRICE
        };
        let task = Task::new(i, kind, codec.encode(&order)?);
        handles.push(if args.skew {
            pool.submit_to(0, task)
        } else {
            pool.submit(task)
        });
    }

    let mut notional = Decimal::ZERO;
    let (mut ok, mut rejected, mut crashed, mut failed) = (0u64, 0u64, 0u64, 0u64);
    for handle in handles {
        match handle.wait() {
            Ok(value) => {
                notional += value;
                ok += 1;
            }
            Err(PoolError::AllQueuesFull) | Err(PoolError::ShuttingDown) => rejected += 1,
            Err(PoolError::WorkerCrash { .. }) => crashed += 1,
            Err(_) => failed += 1,
        }
    }
    let elapsed = start.elapsed();

    let steals = events
        .try_iter()
        .filter(|e| matches!(e, PoolEvent::StealCompleted { .. }))
        .count();

    println!("\n=== Pool Summary ===");
    println!("Completed:       {}", ok);
    println!("Failed:          {}", failed);
    println!("Crashed:         {}", crashed);
    println!("Rejected:        {}", rejected);
    println!("Steal events:    {}", steals);
    println!("Throughput:      {:.0} tasks/s", common::rate(ok, elapsed));
    println!("Notional:        {}", notional);
    println!("\n{}", pool.stats().to_json());

    let report = pool.shutdown(Duration::from_secs(args.drain_secs));
    info!(
        drained = report.drained,
        abandoned = report.abandoned,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Pool shut down"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
