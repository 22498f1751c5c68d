//! User-visible notifications.
//!
//! A fire-and-forget sink in the style of toast messages: the coordinator never waits on it and
//! never learns whether a notice was shown.

/// A single notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A long-running action started ("Redirecting to Google Docs...").
    Loading(String),
    Success(String),
    Error(String),
    /// Clear any outstanding loading notice.
    Dismiss,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sends notices to the log. Used when there is no interactive front end.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Loading(message) => tracing::info!("{}", message),
            Notice::Success(message) => tracing::info!("{}", message),
            Notice::Error(message) => tracing::error!("{}", message),
            Notice::Dismiss => {}
        }
    }
}
