use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use super::lifecycle::InscricaoError;

/// User-triggered actions that end in a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    LoadProcess,
    LoadDraft,
    Save,
    Submit,
}

impl UserAction {
    pub const fn label(self) -> &'static str {
        match self {
            UserAction::LoadProcess => "load_process",
            UserAction::LoadDraft => "load_draft",
            UserAction::Save => "save",
            UserAction::Submit => "submit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Terminal outcome of one user action, as shown in a toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub action: UserAction,
    pub level: NotificationLevel,
    pub message: String,
    pub retryable: bool,
}

impl Notification {
    pub fn success(action: UserAction, message: impl Into<String>) -> Self {
        Self {
            action,
            level: NotificationLevel::Success,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn error(action: UserAction, error: &InscricaoError) -> Self {
        Self {
            action,
            level: NotificationLevel::Error,
            message: error.user_message(),
            retryable: error.is_retryable(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Keeps every notification in memory; used by tests and the demo.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => info!(
                action = notification.action.label(),
                message = %notification.message,
                "action completed"
            ),
            NotificationLevel::Error => warn!(
                action = notification.action.label(),
                message = %notification.message,
                retryable = notification.retryable,
                "action failed"
            ),
        }
    }
}
