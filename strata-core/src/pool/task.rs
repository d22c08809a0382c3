//! Tasks, task handlers and per-submission result handles
//!
//! A submitted task travels through the queues together with its reply
//! slot as one owned [`QueuedTask`]. Moving it (including a steal) moves both,
//! so a task can never be duplicated. The reply slot resolves exactly once:
//! with the handler's result, with an error, or, if it is dropped unresolved,
//! with `WorkerCrash` (dropped during a panic) or `ShuttingDown`.

use crate::core::PoolError;
use crossbeam_utils::Backoff;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Caller-assigned task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Unit of work: id, type tag and opaque payload
#[derive(Debug, Clone, PartialEq)]
pub struct Task<I> {
    pub id: TaskId,
    pub kind: u32,
    pub data: I,
}

impl<I> Task<I> {
    pub fn new(id: u64, kind: u32, data: I) -> Self {
        Self {
            id: TaskId(id),
            kind,
            data,
        }
    }
}

/// Executes tasks on worker threads.
///
/// One handler instance is shared by every worker. Returning `Err` fails only
/// that task. Panicking crashes the worker thread; the pool replaces it and
/// the task's handle resolves with [`PoolError::WorkerCrash`].
pub trait TaskHandler: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn execute(&self, task: Task<Self::Input>) -> anyhow::Result<Self::Output>;

    /// Handler name for logging
    fn name(&self) -> &'static str {
        "task-handler"
    }
}

/// Adapter turning a closure into a [`TaskHandler`]
pub struct FnHandler<F, I, O> {
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

/// Build a handler from a closure
pub fn handler_fn<F, I, O>(f: F) -> FnHandler<F, I, O>
where
    F: Fn(Task<I>) -> anyhow::Result<O> + Send + Sync + 'static,
{
    FnHandler {
        f,
        _marker: PhantomData,
    }
}

impl<F, I, O> TaskHandler for FnHandler<F, I, O>
where
    F: Fn(Task<I>) -> anyhow::Result<O> + Send + Sync + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    #[inline]
    fn execute(&self, task: Task<I>) -> anyhow::Result<O> {
        (self.f)(task)
    }

    fn name(&self) -> &'static str {
        "fn-handler"
    }
}

type Reply<O> = Result<O, PoolError>;

/// Single-use completion slot paired with a [`TaskHandle`]
pub(crate) struct ReplySlot<O> {
    tx: Option<oneshot::Sender<Reply<O>>>,
    worker: Option<usize>,
}

impl<O> ReplySlot<O> {
    /// Record which worker currently executes the task
    pub(crate) fn claim(&mut self, worker: usize) {
        self.worker = Some(worker);
    }

    pub(crate) fn resolve(mut self, result: Reply<O>) {
        if let Some(tx) = self.tx.take() {
            // Receiver dropped means the caller stopped caring
            let _ = tx.send(result);
        }
    }
}

impl<O> Drop for ReplySlot<O> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let err = match (std::thread::panicking(), self.worker) {
                (true, Some(worker)) => PoolError::WorkerCrash { worker },
                _ => PoolError::ShuttingDown,
            };
            let _ = tx.send(Err(err));
        }
    }
}

/// A task in flight through the pool's queues
pub(crate) struct QueuedTask<I, O> {
    pub(crate) task: Task<I>,
    pub(crate) reply: ReplySlot<O>,
}

impl<I, O> QueuedTask<I, O> {
    pub(crate) fn new(task: Task<I>) -> (Self, TaskHandle<O>) {
        let (tx, rx) = oneshot::channel();
        let handle = TaskHandle { id: task.id, rx };
        let queued = Self {
            task,
            reply: ReplySlot {
                tx: Some(tx),
                worker: None,
            },
        };
        (queued, handle)
    }

    pub(crate) fn id(&self) -> TaskId {
        self.task.id
    }

    /// Resolve without executing
    pub(crate) fn reject(self, err: PoolError) {
        self.reply.resolve(Err(err));
    }
}

/// Future resolving to a submitted task's result.
///
/// Await it from async code, or call [`wait`](Self::wait) /
/// [`wait_timeout`](Self::wait_timeout) from a plain thread.
#[must_use = "the task result is only observable through its handle"]
pub struct TaskHandle<O> {
    id: TaskId,
    rx: oneshot::Receiver<Reply<O>>,
}

impl<O> TaskHandle<O> {
    /// Handle that is already resolved with `err`
    pub(crate) fn rejected(id: TaskId, err: PoolError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Self { id, rx }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Block the current thread until the result arrives.
    ///
    /// # Panics
    /// If called from within an async runtime; await the handle there instead.
    pub fn wait(self) -> Reply<O> {
        self.rx.blocking_recv().unwrap_or(Err(PoolError::ShuttingDown))
    }

    /// Block for at most `timeout`
    pub fn wait_timeout(mut self, timeout: Duration) -> Reply<O> {
        let deadline = Instant::now() + timeout;
        let backoff = Backoff::new();
        loop {
            match self.rx.try_recv() {
                Ok(result) => return result,
                Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(PoolError::ShuttingDown)
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
            if Instant::now() >= deadline {
                return Err(PoolError::Timeout(timeout));
            }
            if backoff.is_completed() {
                std::thread::sleep(Duration::from_micros(200));
            } else {
                backoff.snooze();
            }
        }
    }

    /// Non-blocking check; `None` while the task is still pending
    pub fn try_result(&mut self) -> Option<Reply<O>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(PoolError::ShuttingDown)),
        }
    }
}

impl<O> Future for TaskHandle<O> {
    type Output = Reply<O>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(PoolError::ShuttingDown)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<O> fmt::Debug for TaskHandle<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}
