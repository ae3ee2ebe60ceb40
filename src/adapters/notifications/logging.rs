use async_trait::async_trait;

use crate::ports::{Notification, NotificationError, NotificationSender};

use super::render;

/// Logs notifications instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotificationSender;

impl LoggingNotificationSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSender for LoggingNotificationSender {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let (subject, _) = render(notification);
        tracing::info!(
            kind = notification.kind(),
            user_id = %notification.user_id(),
            email = notification.email().unwrap_or("-"),
            subject = %subject,
            "Notification (not delivered)"
        );
        Ok(())
    }
}
