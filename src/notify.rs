//! Notification sink for user-facing events
//!
//! Every terminal resolution of a task (delivered or failed) produces exactly
//! one notification; transient "job not found" conditions produce none. The
//! dispatcher pushes notifications through the [`NotificationSink`] trait so
//! the embedding application decides how they reach the user — a toast layer,
//! a system tray, a log.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Kind of a user-facing notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// A deliverable arrived
    Success,
    /// Something went wrong and the user should know
    Error,
    /// Informational
    Info,
}

/// A user-facing event emitted by the dispatcher
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    /// Severity/kind of the event
    pub kind: NotificationKind,

    /// Short title, e.g. "Download ready"
    pub title: String,

    /// Longer message naming the source of the event
    pub message: String,
}

impl Notification {
    /// Build a success notification
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Build an error notification
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Build an info notification
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Receiver of user-facing notifications
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification for display
    fn notify(&self, notification: Notification);
}

/// Sink that writes notifications to the tracing log
///
/// Useful for headless deployments and as a safe default.
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => {
                error!(title = %notification.title, message = %notification.message, "notification");
            }
            NotificationKind::Success | NotificationKind::Info => {
                info!(title = %notification.title, message = %notification.message, "notification");
            }
        }
    }
}

/// Sink that fans notifications out over a tokio broadcast channel
///
/// Multiple subscribers receive every notification independently. If a
/// subscriber falls behind the channel capacity it observes a lag error, not
/// a stalled dispatcher.
pub struct BroadcastSink {
    tx: tokio::sync::broadcast::Sender<Notification>,
}

impl BroadcastSink {
    /// Create a sink with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to the notification stream
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, notification: Notification) {
        // send() errs only when there are no subscribers; dropping the
        // notification in that case is fine
        self.tx.send(notification).ok();
    }
}
