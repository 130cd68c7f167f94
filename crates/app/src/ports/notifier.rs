//! Notifier port — delivers messages produced by `notify` actions and jobs.

use std::sync::Arc;

use leadflow_domain::error::NotifyError;

/// Synchronous, fallible notification sink.
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when the message could not be delivered.
    fn notify(&self, recipient: &str, message: &str) -> Result<(), NotifyError>;
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        (**self).notify(recipient, message)
    }
}
