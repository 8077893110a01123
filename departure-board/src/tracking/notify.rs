//! Notification delivery seam.
//!
//! The coordinator only decides what to say and to whom; delivery belongs to
//! the host, reached through [`Notifier`].

use std::future::Future;

use crate::domain::ServiceTarget;

/// A message for one watched trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub target: ServiceTarget,
    pub title: String,
    pub message: String,
}

/// Delivery failure reported by the host.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to notify {target}: {message}")]
pub struct NotifyError {
    pub target: String,
    pub message: String,
}

/// Delivers notifications to host services.
pub trait Notifier {
    fn notify(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Writes every notification to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            target_service = %notification.target,
            title = %notification.title,
            message = %notification.message,
            "notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_accepts_everything() {
        let notification = Notification {
            target: ServiceTarget::parse("notify.phone").unwrap(),
            title: "Zug verspätet".into(),
            message: "ICE 1601 hat 10 Minuten Verspätung".into(),
        };
        assert!(LogNotifier.notify(&notification).await.is_ok());
    }

    #[test]
    fn error_names_target() {
        let err = NotifyError {
            target: "notify.phone".into(),
            message: "service not found".into(),
        };
        assert_eq!(err.to_string(), "failed to notify notify.phone: service not found");
    }
}
