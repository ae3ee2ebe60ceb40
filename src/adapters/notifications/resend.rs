//! Resend email adapter.
//!
//! Sends plain-text transactional email via `POST /emails`.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

use crate::ports::{Notification, NotificationError, NotificationSender};

use super::render;

#[derive(Debug, Clone)]
pub struct ResendConfig {
    api_key: SecretString,
    /// Sender address, e.g. `Household <billing@example.com>`.
    pub from_address: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ResendConfig {
    pub fn new(api_key: SecretString, from_address: impl Into<String>) -> Self {
        Self {
            api_key,
            from_address: from_address.into(),
            base_url: "https://api.resend.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    text: String,
}

pub struct ResendNotificationSender {
    config: ResendConfig,
    client: Client,
}

impl ResendNotificationSender {
    pub fn new(config: ResendConfig) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn emails_url(&self) -> String {
        format!("{}/emails", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl NotificationSender for ResendNotificationSender {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let to = notification
            .email()
            .ok_or_else(|| NotificationError::MissingRecipient(notification.user_id().clone()))?;
        let (subject, text) = render(notification);

        let response = self
            .client
            .post(self.emails_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&SendEmailRequest {
                from: &self.config.from_address,
                to: [to],
                subject,
                text,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotificationError::Timeout(self.config.timeout.as_secs())
                } else {
                    NotificationError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(kind = notification.kind(), user_id = %notification.user_id(), "Email sent");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotificationError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

impl std::fmt::Debug for ResendNotificationSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendNotificationSender")
            .field("from_address", &self.config.from_address)
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}
