/// Transient user-facing notifications
///
/// The session context reports outcomes as [`Notification`]s on an
/// unbounded mpsc channel; the view layer drains the receiver and renders
/// them as toasts.

use tokio::sync::mpsc;

pub const SIGNUP_SUCCESS: &str = "Success";
pub const SIGNUP_ERROR: &str = "Signup Error";
pub const LOGIN_SUCCESS: &str = "Welcome back!";
pub const LOGIN_ERROR: &str = "Login Error";
pub const LOGOUT_SUCCESS: &str = "Logged out";
pub const LOGOUT_ERROR: &str = "Error";
pub const CUSTOM_SSO: &str = "Custom SSO";
pub const SSO_ERROR: &str = "SSO Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

impl Notification {
    pub fn info(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            variant: Variant::Default,
        }
    }

    pub fn destructive(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            variant: Variant::Destructive,
        }
    }
}

/// Sending half of the notification channel
#[derive(Debug, Clone)]
pub(crate) struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub(crate) fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }
}
