//! Notification side channel for non-fatal outcomes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    /// The user must sign in before the action can run.
    AuthPrompt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }

    pub fn auth_prompt() -> Self {
        Self {
            kind: NotificationKind::AuthPrompt,
            message: String::from("Sign in to continue"),
        }
    }
}

pub trait Notifier {
    fn notify(&self, notification: Notification);
}

/// Routes notifications into the log. Used by the terminal front-end.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => tracing::warn!(message = %notification.message, "notification"),
            NotificationKind::AuthPrompt => {
                tracing::info!(message = %notification.message, "sign-in required")
            }
            NotificationKind::Success => {
                tracing::info!(message = %notification.message, "notification")
            }
        }
    }
}
