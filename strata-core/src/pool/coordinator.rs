//! Worker pool coordinator
//!
//! Owns the workers, their private queues, the shared overflow queue and a
//! control thread that supervises everything.
//!
//! ```text
//!  submit ──► least-loaded private queue ──► (full) overflow ──► (full) AllQueuesFull
//!
//!                  ┌──────────── control thread ─────────────┐
//!  worker ── StealRequest ─► forward to workers above threshold
//!  worker ── Donation ─────► redistribute: requester ► overflow ► donor ► reject
//!  worker ── Exited ───────► restart on same queue (RestartBackoff)
//!                  └── every health_check_interval: poll finished threads
//! ```
//!
//! Submission is lock-free: it only touches ring buffers and atomic counters.
//! The worker slot table (command senders, join handles, restart schedule)
//! sits behind a mutex taken by the control thread, the stealing toggles and
//! shutdown.

use super::config::PoolConfig;
use super::events::{EventBus, PoolEvent};
use super::stats::{PoolCounters, PoolStats, WorkerShared, WorkerState};
use super::task::{QueuedTask, Task, TaskHandle, TaskHandler};
use super::worker::{
    Job, JobQueue, Message, Worker, WorkerCommand, WorkerContext, WorkerMessage, WorkerSettings,
};
use crate::core::PoolError;
use crate::resilience::RestartBackoff;
use crate::ring::RingBuffer;
use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use crossbeam_utils::Backoff;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Outcome of [`WorkerPool::shutdown`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Every accepted task resolved before the deadline
    pub drained: bool,
    pub completed: u64,
    pub failed: u64,
    /// Still queued at stop and resolved with `ShuttingDown`
    pub abandoned: u64,
    pub elapsed: Duration,
}

struct WorkerSlot {
    commands: Sender<WorkerCommand>,
    thread: Option<JoinHandle<()>>,
    generation: u64,
    backoff: RestartBackoff,
    restart_at: Option<Instant>,
}

struct PoolInner<H: TaskHandler> {
    config: PoolConfig,
    settings: WorkerSettings,
    handler: Arc<H>,
    queues: Vec<Arc<JobQueue<H>>>,
    overflow: Arc<JobQueue<H>>,
    shared: Vec<Arc<WorkerShared>>,
    slots: Mutex<Vec<WorkerSlot>>,
    control_tx: Sender<Message<H>>,
    events: EventBus,
    counters: PoolCounters,
    accepting: AtomicBool,
    /// Submitters between their `accepting` check and placement
    submitting: AtomicUsize,
    stopping: AtomicBool,
    running: AtomicBool,
    stealing: AtomicBool,
}

/// Work-stealing pool executing tasks with a shared [`TaskHandler`]
pub struct WorkerPool<H: TaskHandler> {
    inner: Arc<PoolInner<H>>,
    control: Mutex<Option<JoinHandle<()>>>,
    report: Mutex<Option<ShutdownReport>>,
}

impl<H: TaskHandler> WorkerPool<H> {
    /// Validate `config`, build the queues and start every worker plus the
    /// control thread.
    pub fn new(config: PoolConfig, handler: H) -> Result<Self> {
        config.validate()?;

        let n = config.workers;
        let (control_tx, control_rx) = channel::unbounded();
        let inner = Arc::new(PoolInner {
            settings: WorkerSettings::from(&config),
            handler: Arc::new(handler),
            queues: (0..n)
                .map(|_| Arc::new(RingBuffer::new(config.worker_queue_capacity)))
                .collect(),
            overflow: Arc::new(RingBuffer::new(config.overflow_capacity)),
            shared: (0..n).map(|_| Arc::new(WorkerShared::new())).collect(),
            slots: Mutex::new(Vec::with_capacity(n)),
            control_tx,
            events: EventBus::new(config.event_buffer),
            counters: PoolCounters::default(),
            accepting: AtomicBool::new(true),
            submitting: AtomicUsize::new(0),
            stopping: AtomicBool::new(false),
            running: AtomicBool::new(true),
            stealing: AtomicBool::new(config.work_stealing),
            config,
        });

        {
            let mut slots = inner.slots.lock();
            for id in 0..n {
                let (commands, thread) = inner
                    .spawn_worker(id, 0)
                    .with_context(|| format!("Failed to spawn worker {}", id))?;
                slots.push(WorkerSlot {
                    commands,
                    thread: Some(thread),
                    generation: 0,
                    backoff: RestartBackoff::new(inner.config.restart_policy()),
                    restart_at: None,
                });
            }
        }

        let control_inner = Arc::clone(&inner);
        let control = thread::Builder::new()
            .name("strata-pool-control".into())
            .spawn(move || control_loop(control_inner, control_rx))
            .context("Failed to spawn pool control thread")?;

        info!(
            workers = n,
            queue_capacity = inner.config.worker_queue_capacity,
            overflow_capacity = inner.config.overflow_capacity,
            work_stealing = inner.config.work_stealing,
            "Worker pool started"
        );

        Ok(Self {
            inner,
            control: Mutex::new(Some(control)),
            report: Mutex::new(None),
        })
    }

    /// Queue `task` on the least-loaded worker (ties go to the lowest index),
    /// falling back to the overflow queue. The handle resolves immediately
    /// with `AllQueuesFull` when both are full.
    pub fn submit(&self, task: Task<H::Input>) -> TaskHandle<H::Output> {
        self.enqueue(task, None)
    }

    /// Queue `task` on worker `worker`'s private queue, falling back to the
    /// overflow queue.
    pub fn submit_to(&self, worker: usize, task: Task<H::Input>) -> TaskHandle<H::Output> {
        if worker >= self.inner.queues.len() {
            self.inner.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return TaskHandle::rejected(task.id, PoolError::UnknownWorker(worker));
        }
        self.enqueue(task, Some(worker))
    }

    /// Submit each task independently
    pub fn submit_batch<T>(&self, tasks: T) -> Vec<TaskHandle<H::Output>>
    where
        T: IntoIterator<Item = Task<H::Input>>,
    {
        tasks.into_iter().map(|t| self.submit(t)).collect()
    }

    fn enqueue(&self, task: Task<H::Input>, pinned: Option<usize>) -> TaskHandle<H::Output> {
        let inner = &self.inner;
        // Pairs with the store in `shutdown`: either this sees the pool
        // closed, or shutdown waits for this placement to finish.
        inner.submitting.fetch_add(1, Ordering::SeqCst);
        let _submitting = Submitting(&inner.submitting);
        if !inner.accepting.load(Ordering::SeqCst) {
            inner.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return TaskHandle::rejected(task.id, PoolError::ShuttingDown);
        }

        let (job, handle) = QueuedTask::new(task);
        // Counted before placement so `pending` never dips below zero
        inner.counters.submitted.fetch_add(1, Ordering::AcqRel);

        let target = pinned.unwrap_or_else(|| inner.least_loaded());
        if let Err(job) = inner.place(target, job) {
            inner.counters.submitted.fetch_sub(1, Ordering::AcqRel);
            inner.counters.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(task = %job.id(), "All queues full, rejecting task");
            job.reject(PoolError::AllQueuesFull);
        }
        handle
    }

    /// Let idle workers steal from busy ones
    pub fn enable_work_stealing(&self) {
        self.inner.set_stealing(true);
    }

    pub fn disable_work_stealing(&self) {
        self.inner.set_stealing(false);
    }

    pub fn is_work_stealing(&self) -> bool {
        self.inner.stealing.load(Ordering::Acquire)
    }

    /// Snapshot of per-worker and pool-wide counters
    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    /// Receive lifecycle events from now on
    pub fn subscribe(&self) -> Receiver<PoolEvent> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn worker_count(&self) -> usize {
        self.inner.queues.len()
    }

    /// Depth of one worker's private queue
    pub fn queue_depth(&self, worker: usize) -> Option<usize> {
        self.inner.queues.get(worker).map(|q| q.len())
    }

    pub fn overflow_depth(&self) -> usize {
        self.inner.overflow.len()
    }

    pub fn is_shutdown(&self) -> bool {
        !self.inner.accepting.load(Ordering::Acquire)
    }

    /// Stop accepting work and wait up to `timeout` for queued tasks to
    /// finish, then stop every worker.
    ///
    /// A slow drain is not an error: whatever is still queued at the
    /// deadline resolves with `ShuttingDown` and the report says
    /// `drained: false`. Tasks already executing are waited for.
    /// Calling it again returns the first report.
    pub fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        let mut report = self.report.lock();
        if let Some(r) = report.as_ref() {
            return r.clone();
        }

        let inner = &self.inner;
        let start = Instant::now();
        inner.accepting.store(false, Ordering::SeqCst);
        info!(timeout_ms = timeout.as_millis() as u64, "Worker pool shutting down");

        // Late submitters are placed (and counted) before draining starts
        let backoff = Backoff::new();
        while inner.submitting.load(Ordering::SeqCst) > 0 {
            backoff.snooze();
        }

        let drained = loop {
            if inner.stats().is_drained() {
                break true;
            }
            if start.elapsed() >= timeout {
                break false;
            }
            thread::sleep(Duration::from_millis(1));
        };

        let threads: Vec<JoinHandle<()>> = {
            let mut slots = inner.slots.lock();
            inner.stopping.store(true, Ordering::Release);
            slots
                .iter_mut()
                .filter_map(|slot| {
                    let _ = slot.commands.send(WorkerCommand::Stop);
                    slot.restart_at = None;
                    slot.thread.take()
                })
                .collect()
        };
        inner.wake_all();
        for t in threads {
            // A worker that panics on its way out has already been accounted for
            let _ = t.join();
        }

        inner.running.store(false, Ordering::Release);
        if let Some(control) = self.control.lock().take() {
            if control.join().is_err() {
                error!("Pool control thread panicked");
            }
        }

        let abandoned = inner.reject_queued();
        let stats = inner.stats();
        let r = ShutdownReport {
            drained,
            completed: stats.completed,
            failed: stats.failed,
            abandoned,
            elapsed: start.elapsed(),
        };
        if drained {
            info!(completed = r.completed, failed = r.failed, "Worker pool drained and stopped");
        } else {
            warn!(
                completed = r.completed,
                failed = r.failed,
                abandoned,
                "Worker pool stopped before draining"
            );
        }
        *report = Some(r.clone());
        r
    }
}

/// Marks a submission in progress until dropped
struct Submitting<'a>(&'a AtomicUsize);

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<H: TaskHandler> Drop for WorkerPool<H> {
    fn drop(&mut self) {
        if self.report.lock().is_none() {
            self.shutdown(Duration::ZERO);
        }
    }
}

impl<H: TaskHandler> PoolInner<H> {
    fn spawn_worker(
        &self,
        id: usize,
        generation: u64,
    ) -> std::io::Result<(Sender<WorkerCommand>, JoinHandle<()>)> {
        let (commands, rx) = channel::unbounded();
        self.shared[id].set_state(WorkerState::Created);
        let ctx = WorkerContext {
            id,
            generation,
            peers: self.queues.len(),
            queue: Arc::clone(&self.queues[id]),
            overflow: Arc::clone(&self.overflow),
            handler: Arc::clone(&self.handler),
            commands: rx,
            control: self.control_tx.clone(),
            shared: Arc::clone(&self.shared[id]),
            stealing: self.stealing.load(Ordering::Acquire),
            settings: self.settings.clone(),
        };
        let thread = Worker::spawn(ctx)?;
        Ok((commands, thread))
    }

    fn least_loaded(&self) -> usize {
        self.queues
            .iter()
            .enumerate()
            .min_by_key(|(_, q)| q.len())
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Private queue of `target`, else overflow; hands the job back if both are full
    fn place(&self, target: usize, job: Job<H>) -> std::result::Result<(), Job<H>> {
        let job = match self.queues[target].try_enqueue(job) {
            Ok(()) => return Ok(()),
            Err(job) => job,
        };
        self.overflow.try_enqueue(job)?;
        self.wake_all();
        Ok(())
    }

    /// Place donated tasks: requester, then overflow, then back on the donor.
    /// Anything left is rejected with `AllQueuesFull`. Returns how many
    /// reached the requester.
    fn redistribute(&self, donor: usize, requester: usize, tasks: Vec<Job<H>>) -> usize {
        let to_target = self.queues[requester].enqueue_batch(tasks);
        let moved = to_target.enqueued;
        self.shared[requester]
            .stolen
            .fetch_add(moved as u64, Ordering::Relaxed);

        let mut leftover = to_target.rejected;
        if !leftover.is_empty() {
            let to_overflow = self.overflow.enqueue_batch(leftover);
            if to_overflow.enqueued > 0 {
                self.wake_all();
            }
            leftover = to_overflow.rejected;
        }
        if !leftover.is_empty() {
            leftover = self.queues[donor].enqueue_batch(leftover).rejected;
        }
        if !leftover.is_empty() {
            warn!(donor, requester, tasks = leftover.len(), "No room for donated tasks");
            for job in leftover {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                job.reject(PoolError::AllQueuesFull);
            }
        }
        moved
    }

    fn set_stealing(&self, on: bool) {
        self.stealing.store(on, Ordering::Release);
        let slots = self.slots.lock();
        for slot in slots.iter() {
            let _ = slot.commands.send(WorkerCommand::SetStealing(on));
        }
        drop(slots);
        self.wake_all();
        info!(work_stealing = on, "Work stealing toggled");
    }

    fn wake_all(&self) {
        for q in &self.queues {
            q.wake_consumers();
        }
    }

    fn stats(&self) -> PoolStats {
        let workers = self
            .shared
            .iter()
            .zip(&self.queues)
            .enumerate()
            .map(|(id, (shared, queue))| shared.snapshot(id, queue.len()))
            .collect();
        PoolStats::collect(
            workers,
            &self.counters,
            self.overflow.len(),
            self.stealing.load(Ordering::Acquire),
        )
    }

    /// Resolve everything still queued with `ShuttingDown`
    fn reject_queued(&self) -> u64 {
        let mut abandoned = 0;
        for q in self.queues.iter().chain(std::iter::once(&self.overflow)) {
            while let Some(job) = q.try_dequeue() {
                job.reject(PoolError::ShuttingDown);
                abandoned += 1;
            }
        }
        self.counters.dropped.fetch_add(abandoned, Ordering::Relaxed);
        abandoned
    }

    fn handle_message(&self, msg: Message<H>) {
        match msg {
            WorkerMessage::Ready { worker } => {
                self.events.publish(PoolEvent::WorkerReady { worker });
            }
            WorkerMessage::StealRequest { requester } => self.forward_steal(requester),
            WorkerMessage::Donation {
                donor,
                requester,
                tasks,
            } => {
                let offered = tasks.len();
                let moved = self.redistribute(donor, requester, tasks);
                debug!(donor, requester, offered, moved, "Steal completed");
                self.events.publish(PoolEvent::StealCompleted {
                    donor,
                    requester,
                    tasks: moved,
                });
            }
            WorkerMessage::Stats {
                worker,
                processed,
                failed,
            } => {
                debug!(worker, processed, failed, "Worker stats");
                self.events.publish(PoolEvent::WorkerStats {
                    worker,
                    processed,
                    failed,
                });
            }
            WorkerMessage::Exited {
                worker,
                generation,
                crashed,
            } => self.on_exit(worker, generation, crashed, Instant::now()),
        }
    }

    /// Ask every worker holding surplus work to donate to `requester`
    fn forward_steal(&self, requester: usize) {
        if !self.stealing.load(Ordering::Acquire) {
            return;
        }
        let threshold = self.settings.steal_threshold;
        let slots = self.slots.lock();
        for (id, slot) in slots.iter().enumerate() {
            if id == requester || self.queues[id].len() <= threshold {
                continue;
            }
            if slot.commands.send(WorkerCommand::StealRequest { requester }).is_ok() {
                self.queues[id].wake_consumers();
            }
        }
    }

    fn on_exit(&self, worker: usize, generation: u64, crashed: bool, now: Instant) {
        let finished = {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(worker) else {
                return;
            };
            if slot.generation != generation {
                return;
            }
            if self.stopping.load(Ordering::Acquire) {
                return;
            }
            slot.generation += 1;
            let delay = slot.backoff.on_crash(now);
            slot.restart_at = Some(now + delay);
            if crashed {
                warn!(worker, restart_in_ms = delay.as_millis() as u64, "Worker crashed");
            } else {
                warn!(worker, restart_in_ms = delay.as_millis() as u64, "Worker exited unexpectedly");
            }
            slot.thread.take()
        };

        if let Some(t) = finished {
            let _ = t.join();
        }
        self.events.publish(PoolEvent::WorkerCrashed { worker });
    }

    /// Restart due workers and catch threads that died without reporting
    fn supervise(&self, now: Instant) {
        let dead: Vec<(usize, u64, bool)> = {
            let slots = self.slots.lock();
            slots
                .iter()
                .enumerate()
                .filter(|(_, s)| s.thread.as_ref().map_or(false, |t| t.is_finished()))
                .map(|(id, s)| {
                    let crashed = self.shared[id].state() == WorkerState::Crashed;
                    (id, s.generation, crashed)
                })
                .collect()
        };
        for (id, generation, crashed) in dead {
            self.on_exit(id, generation, crashed, now);
        }

        let mut slots = self.slots.lock();
        if self.stopping.load(Ordering::Acquire) {
            return;
        }
        for (id, slot) in slots.iter_mut().enumerate() {
            match slot.restart_at {
                Some(at) if at <= now => {}
                _ => continue,
            }
            let restarts = self.shared[id].restarts.fetch_add(1, Ordering::AcqRel) + 1;
            match self.spawn_worker(id, slot.generation) {
                Ok((commands, thread)) => {
                    slot.commands = commands;
                    slot.thread = Some(thread);
                    slot.restart_at = None;
                    info!(worker = id, restarts, "Worker restarted");
                    self.events.publish(PoolEvent::WorkerRestarted {
                        worker: id,
                        restarts,
                    });
                }
                Err(e) => {
                    self.shared[id].restarts.fetch_sub(1, Ordering::AcqRel);
                    error!(worker = id, "Failed to restart worker: {}", e);
                    slot.restart_at = Some(now + self.config.health_check_interval());
                }
            }
        }
    }

    /// Messages left after the loop stops; donated tasks are rejected
    fn drain_messages(&self, rx: &Receiver<Message<H>>) {
        for msg in rx.try_iter() {
            if let WorkerMessage::Donation { tasks, .. } = msg {
                for job in tasks {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    job.reject(PoolError::ShuttingDown);
                }
            }
        }
    }
}

fn control_loop<H: TaskHandler>(inner: Arc<PoolInner<H>>, rx: Receiver<Message<H>>) {
    let tick = inner.config.health_check_interval();
    debug!(tick_ms = tick.as_millis() as u64, "Pool control thread started");

    while inner.running.load(Ordering::Acquire) {
        match rx.recv_timeout(tick) {
            Ok(msg) => {
                inner.handle_message(msg);
                for msg in rx.try_iter().take(1024) {
                    inner.handle_message(msg);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        inner.supervise(Instant::now());
    }

    inner.drain_messages(&rx);
    debug!("Pool control thread stopped");
}
