//! Notification adapters.
//!
//! - `ResendNotificationSender` - transactional email through the Resend API
//! - `LoggingNotificationSender` - writes notifications to the log (local dev)
//! - `RecordingNotificationSender` - captures notifications for assertions

mod logging;
mod recording;
mod resend;

pub use logging::LoggingNotificationSender;
pub use recording::RecordingNotificationSender;
pub use resend::{ResendConfig, ResendNotificationSender};

use crate::ports::Notification;

/// Subject line and plain-text body for a notification.
pub(crate) fn render(notification: &Notification) -> (String, String) {
    match notification {
        Notification::Welcome {
            tier,
            founding_member_number,
            ..
        } => {
            let subject = format!("Welcome to Household {}", display_tier(tier.as_str()));
            let mut body = format!(
                "Your {} subscription is active. Every paid feature is now unlocked for your household.",
                display_tier(tier.as_str())
            );
            if let Some(number) = founding_member_number {
                body.push_str(&format!(
                    "\n\nYou are founding member #{}. Thank you for being here early.",
                    number
                ));
            }
            (subject, body)
        }
        Notification::Cancellation { previous_tier, .. } => (
            "Your Household subscription was canceled".to_string(),
            format!(
                "Your {} subscription has been canceled and your household is back on the Free plan. \
                 You can resubscribe at any time.",
                display_tier(previous_tier.as_str())
            ),
        ),
    }
}

fn display_tier(tier: &str) -> String {
    let mut chars = tier.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
