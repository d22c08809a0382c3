//! Worker thread
//!
//! Each worker owns one private queue and shares the overflow queue with
//! every other worker. It never touches another worker's queue: surplus work
//! is handed to the control thread as a donation.
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────┐
//!   │ drain commands ── Stop ─────────────────────────► exit   │
//!   │      │  StealRequest ─► depth > threshold? donate half   │
//!   │      ▼                                                   │
//!   │ private queue ─► overflow queue ─► task? ─► execute ─────┤
//!   │                                      │                   │
//!   │                                      └─ none ─► Idle:    │
//!   │                               steal request (cooldown),  │
//!   │                               park on private queue ─────┘
//! ```
//!
//! A handler panic unwinds the thread. The in-flight task resolves with
//! `WorkerCrash` and the exit guard reports the crash to the control thread,
//! which spawns a replacement on the same private queue.

use super::config::PoolConfig;
use super::stats::{WorkerShared, WorkerState};
use super::task::{QueuedTask, TaskHandler};
use crate::core::PoolError;
use crate::perf;
use crate::ring::RingBuffer;
use crossbeam::channel::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub(crate) type Job<H> = QueuedTask<<H as TaskHandler>::Input, <H as TaskHandler>::Output>;
pub(crate) type JobQueue<H> = RingBuffer<Job<H>>;
pub(crate) type Message<H> = WorkerMessage<<H as TaskHandler>::Input, <H as TaskHandler>::Output>;

/// Control thread → worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerCommand {
    /// `requester` is idle; donate if above the steal threshold
    StealRequest { requester: usize },
    SetStealing(bool),
    Stop,
}

/// Worker → control thread
pub(crate) enum WorkerMessage<I, O> {
    Ready {
        worker: usize,
    },
    StealRequest {
        requester: usize,
    },
    Donation {
        donor: usize,
        requester: usize,
        tasks: Vec<QueuedTask<I, O>>,
    },
    Stats {
        worker: usize,
        processed: u64,
        failed: u64,
    },
    Exited {
        worker: usize,
        generation: u64,
        crashed: bool,
    },
}

/// Knobs a worker reads from [`PoolConfig`]
#[derive(Debug, Clone)]
pub(crate) struct WorkerSettings {
    pub idle_wait: Duration,
    pub steal_cooldown: Duration,
    pub steal_threshold: usize,
    pub stats_interval: u64,
    pub cpu_affinity: bool,
}

impl From<&PoolConfig> for WorkerSettings {
    fn from(cfg: &PoolConfig) -> Self {
        Self {
            idle_wait: cfg.idle_wait(),
            steal_cooldown: cfg.steal_cooldown(),
            steal_threshold: cfg.steal_threshold,
            stats_interval: cfg.stats_interval,
            cpu_affinity: cfg.cpu_affinity,
        }
    }
}

/// Everything a worker thread needs, handed over at spawn
pub(crate) struct WorkerContext<H: TaskHandler> {
    pub id: usize,
    /// Bumped on every restart of this slot; tags the exit report
    pub generation: u64,
    /// Workers in the pool; a lone worker never asks for steals
    pub peers: usize,
    pub queue: Arc<JobQueue<H>>,
    pub overflow: Arc<JobQueue<H>>,
    pub handler: Arc<H>,
    pub commands: Receiver<WorkerCommand>,
    pub control: Sender<Message<H>>,
    pub shared: Arc<WorkerShared>,
    pub stealing: bool,
    pub settings: WorkerSettings,
}

pub(crate) struct Worker<H: TaskHandler> {
    ctx: WorkerContext<H>,
    stealing: bool,
    last_steal_request: Option<Instant>,
    since_stats: u64,
}

impl<H: TaskHandler> Worker<H> {
    pub(crate) fn new(ctx: WorkerContext<H>) -> Self {
        Self {
            stealing: ctx.stealing,
            ctx,
            last_steal_request: None,
            since_stats: 0,
        }
    }

    /// Start the worker on a dedicated named thread
    pub(crate) fn spawn(ctx: WorkerContext<H>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("strata-worker-{}", ctx.id))
            .spawn(move || Worker::new(ctx).run())
    }

    pub(crate) fn run(mut self) {
        let id = self.ctx.id;
        let _exit = ExitGuard {
            worker: id,
            generation: self.ctx.generation,
            shared: Arc::clone(&self.ctx.shared),
            control: self.ctx.control.clone(),
        };

        if self.ctx.settings.cpu_affinity {
            perf::pin_worker(id);
        }

        self.ctx.shared.set_state(WorkerState::Ready);
        let _ = self.ctx.control.send(WorkerMessage::Ready { worker: id });
        self.ctx.shared.set_state(WorkerState::Running);
        info!(
            worker = id,
            generation = self.ctx.generation,
            handler = self.ctx.handler.name(),
            "Worker started"
        );

        while self.drain_commands() {
            match self.next_job() {
                Some(job) => self.execute(job),
                None => self.idle(),
            }
        }

        debug!(worker = id, "Worker stopping");
    }

    /// Apply queued commands. Returns false once the worker should exit.
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.ctx.commands.try_recv() {
                Ok(WorkerCommand::StealRequest { requester }) => self.donate(requester),
                Ok(WorkerCommand::SetStealing(on)) => self.stealing = on,
                Ok(WorkerCommand::Stop) => return false,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    #[inline]
    fn next_job(&self) -> Option<Job<H>> {
        self.ctx
            .queue
            .try_dequeue()
            .or_else(|| self.ctx.overflow.try_dequeue())
    }

    fn execute(&mut self, job: Job<H>) {
        let QueuedTask { task, mut reply } = job;
        reply.claim(self.ctx.id);
        let shared = Arc::clone(&self.ctx.shared);
        // Declared after `reply`, so on unwind it runs first
        let _tally = CountOnUnwind(&shared.failed);

        shared.set_state(WorkerState::Busy);
        let task_id = task.id;
        match self.ctx.handler.execute(task) {
            Ok(output) => {
                shared.processed.fetch_add(1, Ordering::Relaxed);
                reply.resolve(Ok(output));
            }
            Err(e) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                debug!(worker = self.ctx.id, task = %task_id, "Task failed: {:#}", e);
                reply.resolve(Err(PoolError::TaskExecution(format!("{:#}", e))));
            }
        }
        shared.set_state(WorkerState::Running);

        self.since_stats += 1;
        let interval = self.ctx.settings.stats_interval;
        if interval > 0 && self.since_stats >= interval {
            self.since_stats = 0;
            let _ = self.ctx.control.send(WorkerMessage::Stats {
                worker: self.ctx.id,
                processed: shared.processed(),
                failed: shared.failed(),
            });
        }
    }

    fn idle(&mut self) {
        self.ctx.shared.set_state(WorkerState::Idle);

        if self.stealing && self.ctx.peers > 1 {
            let now = Instant::now();
            let cooled = self
                .last_steal_request
                .map_or(true, |t| now.duration_since(t) >= self.ctx.settings.steal_cooldown);
            if cooled {
                self.last_steal_request = Some(now);
                let _ = self.ctx.control.send(WorkerMessage::StealRequest {
                    requester: self.ctx.id,
                });
            }
        }

        self.ctx.queue.wait_for_item(self.ctx.settings.idle_wait);
    }

    fn donate(&mut self, requester: usize) {
        if !self.stealing || requester == self.ctx.id {
            return;
        }
        let tasks = take_surplus(&self.ctx.queue, self.ctx.settings.steal_threshold);
        if tasks.is_empty() {
            return;
        }

        let count = tasks.len() as u64;
        self.ctx.shared.donated.fetch_add(count, Ordering::Relaxed);
        debug!(donor = self.ctx.id, requester, tasks = count, "Donating tasks");
        // On a closed channel the returned tasks drop and resolve as ShuttingDown
        let _ = self.ctx.control.send(WorkerMessage::Donation {
            donor: self.ctx.id,
            requester,
            tasks,
        });
    }
}

/// Dequeue half of `queue` (rounded down) if its depth exceeds `threshold`
pub(crate) fn take_surplus<T>(queue: &RingBuffer<T>, threshold: usize) -> Vec<T> {
    let depth = queue.len();
    if depth <= threshold {
        return Vec::new();
    }
    queue.dequeue_batch(depth / 2)
}

/// Counts a failed task when the handler unwinds
struct CountOnUnwind<'a>(&'a AtomicU64);

impl Drop for CountOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Reports the thread's exit to the control thread, crash or not
struct ExitGuard<I, O> {
    worker: usize,
    generation: u64,
    shared: Arc<WorkerShared>,
    control: Sender<WorkerMessage<I, O>>,
}

impl<I, O> Drop for ExitGuard<I, O> {
    fn drop(&mut self) {
        let crashed = thread::panicking();
        self.shared.set_state(if crashed {
            WorkerState::Crashed
        } else {
            WorkerState::Stopped
        });
        let _ = self.control.send(WorkerMessage::Exited {
            worker: self.worker,
            generation: self.generation,
            crashed,
        });
    }
}
