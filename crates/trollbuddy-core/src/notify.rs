//! Single-slot notification channel.
//!
//! At most one notification is live at a time. Emitting a new one replaces
//! the current one and cancels its pending auto-dismiss timer. Consumers
//! observe the slot through a `watch` receiver.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Default time a notification stays visible.
pub const DEFAULT_DISMISS_AFTER: Duration = Duration::from_millis(5000);

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// Contents of the notification slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationState {
    pub visible: bool,
    pub message: String,
    pub kind: NotificationKind,
}

impl Default for NotificationState {
    fn default() -> Self {
        Self {
            visible: false,
            message: String::new(),
            kind: NotificationKind::Success,
        }
    }
}

/// Reporting interface injected into the session and capture components.
pub trait Notifier: Send + Sync {
    /// Publish a notification, preempting whatever is currently shown.
    fn emit(&self, message: &str, kind: NotificationKind);

    /// Observe the slot. The receiver starts at the current state.
    fn subscribe(&self) -> watch::Receiver<NotificationState>;

    fn success(&self, message: &str) {
        self.emit(message, NotificationKind::Success);
    }

    fn error(&self, message: &str) {
        self.emit(message, NotificationKind::Error);
    }
}

/// Process-wide notification slot with auto-dismiss.
pub struct NotificationService {
    tx: Arc<watch::Sender<NotificationState>>,
    dismiss_after: Duration,
    pending_dismiss: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationService {
    pub fn new(dismiss_after: Duration) -> Self {
        let (tx, _) = watch::channel(NotificationState::default());
        Self {
            tx: Arc::new(tx),
            dismiss_after,
            pending_dismiss: Mutex::new(None),
        }
    }

    /// Snapshot of the current slot.
    pub fn current(&self) -> NotificationState {
        self.tx.borrow().clone()
    }

    /// Clear the slot immediately.
    pub fn hide(&self) {
        self.cancel_pending_dismiss();
        self.tx.send_replace(NotificationState::default());
    }

    fn cancel_pending_dismiss(&self) {
        let mut pending = self
            .pending_dismiss
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }

    fn schedule_dismiss(&self) {
        if self.dismiss_after.is_zero() {
            return;
        }
        // Without a runtime the notification simply stays until replaced.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let tx = Arc::clone(&self.tx);
        let delay = self.dismiss_after;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tx.send_replace(NotificationState::default());
        });

        *self
            .pending_dismiss
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new(DEFAULT_DISMISS_AFTER)
    }
}

impl Notifier for NotificationService {
    fn emit(&self, message: &str, kind: NotificationKind) {
        match kind {
            NotificationKind::Success => info!(message, "Notification"),
            NotificationKind::Error => warn!(message, "Error notification"),
        }

        self.cancel_pending_dismiss();
        self.tx.send_replace(NotificationState {
            visible: true,
            message: message.to_string(),
            kind,
        });
        self.schedule_dismiss();
    }

    fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.tx.subscribe()
    }
}

impl Drop for NotificationService {
    fn drop(&mut self) {
        self.cancel_pending_dismiss();
    }
}
