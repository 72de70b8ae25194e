//! Queue error types.

use crate::queue::TaskId;

/// Classifies task errors as worth another attempt or not.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// The task stopped because its caller withdrew it. Such outcomes are
    /// neither recorded as failures nor able to trigger an abort.
    fn is_cancellation(&self) -> bool {
        false
    }
}

/// Terminal outcome of a task that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum TaskError<E> {
    /// The task failed with a non-retryable error or ran out of retries.
    #[error("failed after {attempts} attempt(s): {error}")]
    Failed { attempts: u32, error: E },

    /// The task was dropped before it could settle (queue aborted or dropped).
    #[error("aborted before completion")]
    Aborted,
}

impl<E> TaskError<E> {
    /// Returns the underlying error, if the task actually ran and failed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            TaskError::Failed { error, .. } => Some(error),
            TaskError::Aborted => None,
        }
    }
}

/// A task that failed terminally, as collected by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub task: TaskId,
    pub attempts: u32,
    pub message: String,
}
