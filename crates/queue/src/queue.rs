use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{Notify, oneshot};
use tracing::{debug, warn};

use crate::error::{FailureRecord, Retryable, TaskError};

/// Identifier assigned to each enqueued task, unique per queue.
pub type TaskId = u64;

/// Failure records kept before the oldest are discarded.
pub const MAX_FAILURE_RECORDS: usize = 256;

/// What the queue does when a task fails terminally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and keep running the remaining tasks.
    #[default]
    Continue,
    /// Drop every still-queued task; in-flight tasks finish.
    Abort,
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum tasks running at once. 0 is treated as 1.
    pub concurrency: usize,
    /// Retries per task after the first attempt.
    pub retry_limit: u32,
    pub failure_policy: FailurePolicy,
    /// Start dequeuing immediately. When `false`, call [`Queue::start`].
    pub auto_start: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            retry_limit: 3,
            failure_policy: FailurePolicy::Continue,
            auto_start: true,
        }
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub retried: u64,
}

// ---------------------------------------------------------------------------
// Type-erased jobs
// ---------------------------------------------------------------------------

enum Settled {
    Succeeded,
    Retry(Box<dyn Job>, String),
    Failed(String),
    Cancelled,
}

trait Job: Send {
    fn id(&self) -> TaskId;

    /// Runs one attempt. `prior` is the number of attempts already made.
    fn run(self: Box<Self>, prior: u32, retry_limit: u32) -> BoxFuture<'static, Settled>;
}

type Work<T, E> = Box<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

struct TypedJob<T, E> {
    id: TaskId,
    work: Work<T, E>,
    reply: oneshot::Sender<Result<T, TaskError<E>>>,
}

impl<T, E> Job for TypedJob<T, E>
where
    T: Send + 'static,
    E: Retryable + fmt::Display + Send + 'static,
{
    fn id(&self) -> TaskId {
        self.id
    }

    fn run(self: Box<Self>, prior: u32, retry_limit: u32) -> BoxFuture<'static, Settled> {
        Box::pin(async move {
            match (self.work)().await {
                Ok(value) => {
                    let _ = self.reply.send(Ok(value));
                    Settled::Succeeded
                }
                Err(e) if e.is_cancellation() => {
                    let _ = self.reply.send(Err(TaskError::Failed {
                        attempts: prior + 1,
                        error: e,
                    }));
                    Settled::Cancelled
                }
                Err(e) if e.is_retryable() && prior < retry_limit => {
                    let msg = e.to_string();
                    Settled::Retry(self, msg)
                }
                Err(e) => {
                    let msg = e.to_string();
                    let _ = self.reply.send(Err(TaskError::Failed {
                        attempts: prior + 1,
                        error: e,
                    }));
                    Settled::Failed(msg)
                }
            }
        })
    }
}

struct Entry {
    /// Attempts already made.
    attempts: u32,
    job: Box<dyn Job>,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

struct State {
    pending: VecDeque<Entry>,
    running: usize,
    started: bool,
    aborted: bool,
    succeeded: u64,
    failed: u64,
    cancelled: u64,
    retried: u64,
    failures: VecDeque<FailureRecord>,
}

struct Shared {
    concurrency: usize,
    retry_limit: u32,
    policy: FailurePolicy,
    next_id: AtomicU64,
    state: Mutex<State>,
    idle: Notify,
}

/// Shared bounded-concurrency queue. Clones share one budget.
///
/// Tasks are spawned on the current Tokio runtime, so [`enqueue`](Self::enqueue)
/// and [`start`](Self::start) must be called from within one.
#[derive(Clone)]
pub struct Queue {
    shared: Arc<Shared>,
}

impl Queue {
    /// Creates a queue.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                concurrency: config.concurrency.max(1),
                retry_limit: config.retry_limit,
                policy: config.failure_policy,
                next_id: AtomicU64::new(1),
                state: Mutex::new(State {
                    pending: VecDeque::new(),
                    running: 0,
                    started: config.auto_start,
                    aborted: false,
                    succeeded: 0,
                    failed: 0,
                    cancelled: 0,
                    retried: 0,
                    failures: VecDeque::new(),
                }),
                idle: Notify::new(),
            }),
        }
    }

    /// Queues `work` at the tail. `work` is called once per attempt.
    ///
    /// The returned handle resolves when the task settles. If the queue has
    /// been aborted, the handle resolves to [`TaskError::Aborted`] without
    /// the task ever running.
    pub fn enqueue<T, E, F, Fut>(&self, work: F) -> TaskHandle<T, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Retryable + fmt::Display + Send + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        let job = TypedJob {
            id,
            work: Box::new(move || work().boxed()),
            reply,
        };

        {
            let mut st = self.shared.state.lock().unwrap();
            if st.aborted {
                debug!(task = id, "queue aborted, dropping task");
                return TaskHandle { id, rx };
            }
            st.pending.push_back(Entry {
                attempts: 0,
                job: Box::new(job),
            });
        }

        pump(&self.shared);
        TaskHandle { id, rx }
    }

    /// Resumes dequeuing (and clears a previous abort).
    pub fn start(&self) {
        {
            let mut st = self.shared.state.lock().unwrap();
            st.started = true;
            st.aborted = false;
        }
        pump(&self.shared);
    }

    /// Stops dequeuing. In-flight tasks run to completion.
    pub fn stop(&self) {
        self.shared.state.lock().unwrap().started = false;
    }

    pub fn is_started(&self) -> bool {
        self.shared.state.lock().unwrap().started
    }

    /// Waits until nothing is pending or running.
    ///
    /// A stopped queue with pending tasks only drains after [`start`](Self::start).
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_idle(&self) -> bool {
        let st = self.shared.state.lock().unwrap();
        st.pending.is_empty() && st.running == 0
    }

    /// Number of tasks waiting for a slot.
    pub fn len(&self) -> usize {
        self.shared.state.lock().unwrap().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn concurrency(&self) -> usize {
        self.shared.concurrency
    }

    pub fn stats(&self) -> QueueStats {
        let st = self.shared.state.lock().unwrap();
        QueueStats {
            pending: st.pending.len(),
            running: st.running,
            succeeded: st.succeeded,
            failed: st.failed,
            cancelled: st.cancelled,
            retried: st.retried,
        }
    }

    /// Recent terminal failures, oldest first. At most
    /// [`MAX_FAILURE_RECORDS`] are kept.
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.shared.state.lock().unwrap().failures.iter().cloned().collect()
    }

    /// Removes and returns the recorded failures.
    pub fn take_failures(&self) -> Vec<FailureRecord> {
        let mut st = self.shared.state.lock().unwrap();
        st.failures.drain(..).collect()
    }
}

/// Moves pending entries into free slots.
fn pump(shared: &Arc<Shared>) {
    let mut batch = Vec::new();
    let idle = {
        let mut st = shared.state.lock().unwrap();
        while st.started && st.running < shared.concurrency {
            let Some(entry) = st.pending.pop_front() else {
                break;
            };
            st.running += 1;
            batch.push(entry);
        }
        st.pending.is_empty() && st.running == 0
    };

    if idle {
        shared.idle.notify_waiters();
    }

    for entry in batch {
        spawn_attempt(Arc::clone(shared), entry);
    }
}

fn spawn_attempt(shared: Arc<Shared>, entry: Entry) {
    let task = entry.job.id();
    let prior = entry.attempts;
    let retry_limit = shared.retry_limit;
    debug!(task, attempt = prior + 1, "dispatching task");

    tokio::spawn(async move {
        let settled = AssertUnwindSafe(entry.job.run(prior, retry_limit))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Settled::Failed("task panicked".into()));
        settle(&shared, task, prior + 1, settled);
        pump(&shared);
    });
}

fn settle(shared: &Shared, task: TaskId, attempts: u32, settled: Settled) {
    let dropped = {
        let mut st = shared.state.lock().unwrap();
        st.running -= 1;

        match settled {
            Settled::Succeeded => {
                st.succeeded += 1;
                VecDeque::new()
            }
            Settled::Retry(job, msg) => {
                warn!(task, attempt = attempts, error = %msg, "task failed, requeued at tail");
                st.retried += 1;
                if st.aborted {
                    // Dropping the job resolves its handle as aborted.
                    drop(job);
                } else {
                    st.pending.push_back(Entry { attempts, job });
                }
                VecDeque::new()
            }
            Settled::Failed(msg) => {
                warn!(task, attempts, error = %msg, "task failed terminally");
                st.failed += 1;
                if st.failures.len() == MAX_FAILURE_RECORDS {
                    st.failures.pop_front();
                }
                st.failures.push_back(FailureRecord {
                    task,
                    attempts,
                    message: msg,
                });
                if shared.policy == FailurePolicy::Abort {
                    st.aborted = true;
                    std::mem::take(&mut st.pending)
                } else {
                    VecDeque::new()
                }
            }
            Settled::Cancelled => {
                debug!(task, "task cancelled by its caller");
                st.cancelled += 1;
                VecDeque::new()
            }
        }
    };

    if !dropped.is_empty() {
        warn!(dropped = dropped.len(), "queue aborted, dropping pending tasks");
    }
}

/// Resolves to the task's terminal outcome.
pub struct TaskHandle<T, E> {
    id: TaskId,
    rx: oneshot::Receiver<Result<T, TaskError<E>>>,
}

impl<T, E> TaskHandle<T, E> {
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl<T, E> Future for TaskHandle<T, E> {
    type Output = Result<T, TaskError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Aborted)),
            Poll::Pending => Poll::Pending,
        }
    }
}
