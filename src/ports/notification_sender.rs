//! Notification sender port.
//!
//! Welcome and cancellation messages are side effects of a committed state
//! change. Failures are reported to the caller, which logs them; they never
//! affect webhook processing.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::billing::SubscriptionTier;
use crate::domain::foundation::UserId;

/// A message to a household account owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Welcome {
        user_id: UserId,
        email: Option<String>,
        tier: SubscriptionTier,
        founding_member_number: Option<u32>,
    },
    Cancellation {
        user_id: UserId,
        email: Option<String>,
        previous_tier: SubscriptionTier,
    },
}

impl Notification {
    pub fn user_id(&self) -> &UserId {
        match self {
            Notification::Welcome { user_id, .. } | Notification::Cancellation { user_id, .. } => {
                user_id
            }
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Notification::Welcome { email, .. } | Notification::Cancellation { email, .. } => {
                email.as_deref()
            }
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Welcome { .. } => "welcome",
            Notification::Cancellation { .. } => "cancellation",
        }
    }
}

/// Errors from a notification backend.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("no recipient address for user {0}")]
    MissingRecipient(UserId),

    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("notification timed out after {0}s")]
    Timeout(u64),
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}
