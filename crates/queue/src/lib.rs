//! Bounded-concurrency work queue.
//!
//! Runs at most `concurrency` tasks at once. A task whose error is
//! [`Retryable`] goes back to the **tail** of the queue, not retried in
//! place, until it has used up `retry_limit` retries. One task exhausting
//! its retries does not stop the others unless the queue is configured
//! with [`FailurePolicy::Abort`].
//!
//! A [`Queue`] is cheap to clone and is meant to be shared: every clone
//! draws from the same concurrency budget.

mod error;
mod queue;

pub use error::{FailureRecord, Retryable, TaskError};
pub use queue::{
    FailurePolicy, MAX_FAILURE_RECORDS, Queue, QueueConfig, QueueStats, TaskHandle, TaskId,
};
