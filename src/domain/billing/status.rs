//! Subscription status state machine.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an account subscription.
///
/// Revocations and refunds land in `Canceled` as well; the ledger keeps the
/// distinction through the event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Parses the stored representation; `cancelled` is accepted for older rows.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(SubscriptionStatus::Active),
            "canceled" | "cancelled" => Some(SubscriptionStatus::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // Upgrade, downgrade, renewal
            (Active, Active)
                | (Active, Canceled)
            // Reactivation
                | (Canceled, Active)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_can_renew_and_cancel() {
        use SubscriptionStatus::*;
        assert!(Active.can_transition_to(&Active));
        assert!(Active.can_transition_to(&Canceled));
    }

    #[test]
    fn canceled_can_reactivate() {
        assert!(SubscriptionStatus::Canceled.can_transition_to(&SubscriptionStatus::Active));
    }

    #[test]
    fn canceled_cannot_cancel_again() {
        let result = SubscriptionStatus::Canceled.transition_to(SubscriptionStatus::Canceled);
        assert!(result.is_err());
    }

    #[test]
    fn parse_accepts_british_spelling() {
        assert_eq!(
            SubscriptionStatus::parse("cancelled"),
            Some(SubscriptionStatus::Canceled)
        );
        assert_eq!(SubscriptionStatus::parse("paused"), None);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SubscriptionStatus::Canceled).unwrap();
        assert_eq!(json, "\"canceled\"");
    }
}
