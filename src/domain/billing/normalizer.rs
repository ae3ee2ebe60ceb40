//! Provider payload → canonical `BillingEvent`.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::foundation::{Timestamp, UserId};

use super::billing_event::{
    BillingEvent, CancellationDetails, CheckoutDetails, SubscriptionDetails,
};
use super::envelope::WebhookEnvelope;
use super::pricing::Plan;
use super::product_catalog::ProductCatalog;
use super::tier::{BillingPeriod, SubscriptionTier};
use super::webhook_errors::WebhookError;

/// Checkout statuses that count as a completed payment on `checkout.updated`.
const COMPLETED_CHECKOUT_STATUSES: [&str; 2] = ["succeeded", "confirmed"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProviderData {
    id: Option<String>,
    #[serde(alias = "customer_id")]
    customer_id: Option<String>,
    #[serde(alias = "product_id")]
    product_id: Option<String>,
    status: Option<String>,
    #[serde(alias = "current_period_start")]
    current_period_start: Option<Value>,
    #[serde(alias = "current_period_end")]
    current_period_end: Option<Value>,
    #[serde(alias = "subscription_id")]
    subscription_id: Option<String>,
    #[serde(alias = "customer_email")]
    customer_email: Option<String>,
    customer: Option<ProviderCustomer>,
    metadata: Option<ProviderMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderCustomer {
    id: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProviderMetadata {
    #[serde(alias = "user_id")]
    user_id: Option<String>,
    period: Option<String>,
    tier: Option<String>,
}

impl ProviderData {
    fn customer_ref(&self) -> Option<String> {
        non_empty(self.customer_id.clone())
            .or_else(|| self.customer.as_ref().and_then(|c| non_empty(c.id.clone())))
    }

    fn customer_email(&self) -> Option<String> {
        non_empty(self.customer_email.clone())
            .or_else(|| self.customer.as_ref().and_then(|c| non_empty(c.email.clone())))
    }

    fn metadata(&self) -> &ProviderMetadata {
        static EMPTY: ProviderMetadata = ProviderMetadata {
            user_id: None,
            period: None,
            tier: None,
        };
        self.metadata.as_ref().unwrap_or(&EMPTY)
    }

    fn metadata_user_id(&self) -> Option<UserId> {
        self.metadata()
            .user_id
            .as_deref()
            .and_then(|id| UserId::new(id).ok())
    }
}

/// Maps validated envelopes to canonical events.
#[derive(Debug, Clone, Default)]
pub struct EventNormalizer {
    catalog: ProductCatalog,
}

impl EventNormalizer {
    pub fn new(catalog: ProductCatalog) -> Self {
        Self { catalog }
    }

    /// Normalizes an envelope.
    ///
    /// # Errors
    ///
    /// - `Ignored` - unknown event type, or an event that carries nothing to apply
    /// - `PayloadMalformed` - a known event missing a required field
    pub fn normalize(&self, envelope: &WebhookEnvelope) -> Result<BillingEvent, WebhookError> {
        let data: ProviderData = serde_json::from_value(Value::Object(envelope.data.clone()))
            .map_err(|e| WebhookError::malformed(format!("invalid data: {}", e)))?;

        match envelope.event_type.as_str() {
            "checkout.succeeded" | "checkout.completed" => self.checkout(data),
            "checkout.updated" => {
                let completed = data
                    .status
                    .as_deref()
                    .map(|s| COMPLETED_CHECKOUT_STATUSES.contains(&s.to_ascii_lowercase().as_str()))
                    .unwrap_or(false);
                if completed {
                    self.checkout(data)
                } else {
                    Err(WebhookError::Ignored(
                        "checkout.updated without completed status".to_string(),
                    ))
                }
            }
            "subscription.created" => Ok(BillingEvent::SubscriptionCreated(self.subscription(data)?)),
            "subscription.active" => Ok(BillingEvent::SubscriptionActive(self.subscription(data)?)),
            "subscription.updated" => Ok(BillingEvent::SubscriptionUpdated(self.subscription(data)?)),
            "subscription.canceled" => Ok(BillingEvent::SubscriptionCanceled(cancellation(data)?)),
            "subscription.revoked" => Ok(BillingEvent::SubscriptionRevoked(cancellation(data)?)),
            "order.refunded" => refund(data).map(BillingEvent::OrderRefunded),
            other => Err(WebhookError::Ignored(format!("unhandled event type: {}", other))),
        }
    }

    fn checkout(&self, data: ProviderData) -> Result<BillingEvent, WebhookError> {
        let checkout_id = non_empty(data.id.clone())
            .ok_or_else(|| WebhookError::malformed("checkout missing 'id'"))?;
        Ok(BillingEvent::CheckoutSucceeded(CheckoutDetails {
            checkout_id,
            customer_ref: data.customer_ref(),
            metadata_user_id: data.metadata_user_id(),
            customer_email: data.customer_email(),
        }))
    }

    fn subscription(&self, data: ProviderData) -> Result<SubscriptionDetails, WebhookError> {
        let subscription_ref = non_empty(data.id.clone())
            .ok_or_else(|| WebhookError::malformed("subscription missing 'id'"))?;
        let plan = self.resolve_plan(&data)?;

        Ok(SubscriptionDetails {
            subscription_ref,
            customer_ref: data.customer_ref(),
            metadata_user_id: data.metadata_user_id(),
            customer_email: data.customer_email(),
            plan,
            period_start: parse_timestamp("currentPeriodStart", data.current_period_start.as_ref())?,
            period_end: parse_timestamp("currentPeriodEnd", data.current_period_end.as_ref())?,
        })
    }

    /// Catalog first, then `metadata.tier` / `metadata.period`.
    fn resolve_plan(&self, data: &ProviderData) -> Result<Plan, WebhookError> {
        if let Some(plan) = data
            .product_id
            .as_deref()
            .and_then(|id| self.catalog.lookup(id))
        {
            return Ok(plan);
        }

        let tier = data
            .metadata()
            .tier
            .as_deref()
            .and_then(SubscriptionTier::parse)
            .filter(SubscriptionTier::is_paid)
            .ok_or_else(|| {
                WebhookError::malformed(format!(
                    "no paid tier for product {:?}",
                    data.product_id.as_deref().unwrap_or("<none>")
                ))
            })?;
        let period = data
            .metadata()
            .period
            .as_deref()
            .and_then(BillingPeriod::parse)
            .unwrap_or_default();

        Ok(Plan::new(tier, period))
    }
}

fn cancellation(data: ProviderData) -> Result<CancellationDetails, WebhookError> {
    let subscription_ref = non_empty(data.id.clone())
        .ok_or_else(|| WebhookError::malformed("subscription missing 'id'"))?;
    Ok(CancellationDetails {
        subscription_ref,
        customer_ref: data.customer_ref(),
        metadata_user_id: data.metadata_user_id(),
        customer_email: data.customer_email(),
        order_ref: None,
    })
}

fn refund(data: ProviderData) -> Result<CancellationDetails, WebhookError> {
    let subscription_ref = non_empty(data.subscription_id.clone()).ok_or_else(|| {
        WebhookError::Ignored("refund without subscription reference".to_string())
    })?;
    Ok(CancellationDetails {
        subscription_ref,
        customer_ref: data.customer_ref(),
        metadata_user_id: data.metadata_user_id(),
        customer_email: data.customer_email(),
        order_ref: non_empty(data.id.clone()),
    })
}

/// Accepts RFC 3339 strings or Unix seconds; null is absent.
fn parse_timestamp(field: &str, value: Option<&Value>) -> Result<Option<Timestamp>, WebhookError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Timestamp::parse_rfc3339(s)
            .map(Some)
            .ok_or_else(|| WebhookError::malformed(format!("invalid timestamp in '{}'", field))),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|secs| Some(Timestamp::from_unix_secs(secs)))
            .ok_or_else(|| WebhookError::malformed(format!("invalid timestamp in '{}'", field))),
        Some(_) => Err(WebhookError::malformed(format!(
            "invalid timestamp in '{}'",
            field
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
