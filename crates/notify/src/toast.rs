use std::sync::{Arc, Mutex};

use crate::{Level, Notifier};

/// Default toast display duration in milliseconds.
const DEFAULT_DURATION_MS: u64 = 4000;

/// Error toasts stay up longer.
const ERROR_DURATION_MS: u64 = 6000;

/// One queued notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub level: Level,
    pub title: String,
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// In-memory toast queue with monotonic ids.
///
/// Display and auto-dismissal belong to whoever renders the toasts.
#[derive(Debug, Clone, Default)]
pub struct ToastQueue {
    toasts: Vec<Toast>,
    next_id: u64,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a toast and returns its id. Duration follows the level.
    pub fn push(&mut self, level: Level, title: impl Into<String>, message: Option<String>) -> u64 {
        let duration_ms = match level {
            Level::Error => ERROR_DURATION_MS,
            _ => DEFAULT_DURATION_MS,
        };
        self.push_with_duration(level, title, message, duration_ms)
    }

    pub fn push_with_duration(
        &mut self,
        level: Level,
        title: impl Into<String>,
        message: Option<String>,
        duration_ms: u64,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.toasts.push(Toast {
            id,
            level,
            title: title.into(),
            message,
            duration_ms,
        });
        id
    }

    pub fn success(&mut self, title: impl Into<String>) -> u64 {
        self.push(Level::Success, title, None)
    }

    pub fn error(&mut self, title: impl Into<String>) -> u64 {
        self.push(Level::Error, title, None)
    }

    pub fn warning(&mut self, title: impl Into<String>) -> u64 {
        self.push(Level::Warning, title, None)
    }

    pub fn info(&mut self, title: impl Into<String>) -> u64 {
        self.push(Level::Info, title, None)
    }

    /// Removes a toast by id. Returns `true` if it was present.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.id != id);
        self.toasts.len() != before
    }

    pub fn get(&self, id: u64) -> Option<&Toast> {
        self.toasts.iter().find(|t| t.id == id)
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    /// Takes every toast out of the queue. Ids keep counting up.
    pub fn drain(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }
}

/// A [`ToastQueue`] behind a lock, usable as a [`Notifier`] from any task.
#[derive(Debug, Clone, Default)]
pub struct SharedToasts {
    inner: Arc<Mutex<ToastQueue>>,
}

impl SharedToasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn drain(&self) -> Vec<Toast> {
        self.inner.lock().unwrap().drain()
    }

    pub fn remove(&self, id: u64) -> bool {
        self.inner.lock().unwrap().remove(id)
    }
}

impl Notifier for SharedToasts {
    fn notify(&self, level: Level, title: &str, message: Option<&str>) {
        self.inner
            .lock()
            .unwrap()
            .push(level, title, message.map(str::to_owned));
    }
}
