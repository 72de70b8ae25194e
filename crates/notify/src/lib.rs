//! User-facing notifications.
//!
//! Library code never talks to a terminal or UI directly. It reports
//! failures through a [`Notifier`] handed in at construction; the caller
//! decides whether that becomes a toast, a log line, or nothing.

mod toast;

use std::sync::Arc;

use tracing::{error, info, warn};

pub use toast::{SharedToasts, Toast, ToastQueue};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
    Warning,
    Info,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
        }
    }
}

/// Capability for surfacing short messages to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: Level, title: &str, message: Option<&str>);

    fn error(&self, title: &str, message: Option<&str>) {
        self.notify(Level::Error, title, message);
    }

    fn success(&self, title: &str, message: Option<&str>) {
        self.notify(Level::Success, title, message);
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, level: Level, title: &str, message: Option<&str>) {
        (**self).notify(level, title, message);
    }
}

/// Forwards notifications to `tracing` and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: Level, title: &str, message: Option<&str>) {
        let message = message.unwrap_or("");
        match level {
            Level::Error => error!(title, message, "notification"),
            Level::Warning => warn!(title, message, "notification"),
            Level::Success | Level::Info => info!(title, message, level = level.as_str(), "notification"),
        }
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _level: Level, _title: &str, _message: Option<&str>) {}
}
