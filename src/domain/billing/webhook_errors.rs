//! Webhook error types for billing webhook handling.
//!
//! Every failure on the webhook path maps to an HTTP status that tells the
//! payment processor whether to redeliver.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header missing, malformed, or digest mismatch.
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    /// Body is not a valid `{type, data}` envelope or a required field is missing.
    #[error("Malformed payload: {0}")]
    PayloadMalformed(String),

    /// No account could be resolved for the event's customer reference.
    #[error("Account unresolved for customer {customer_ref}")]
    AccountUnresolved { customer_ref: String },

    /// The ledger or projection write did not complete.
    #[error("Projection write failed: {0}")]
    ProjectionWriteFailure(String),

    /// Another delivery of the same transition holds a fresh claim and has not
    /// committed. It may have been abandoned, so the processor must retry.
    #[error("Delivery in flight: {0}")]
    DeliveryInFlight(String),

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),
}

impl WebhookError {
    /// Returns true if the processor should redeliver this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::AccountUnresolved { .. }
                | WebhookError::ProjectionWriteFailure(_)
                | WebhookError::DeliveryInFlight(_)
        )
    }

    /// Maps the error to an HTTP status code.
    ///
    /// - 2xx: acknowledged, no redelivery
    /// - 4xx: permanent rejection, no redelivery
    /// - 5xx: transient failure, processor redelivers
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::SignatureInvalid(_) | WebhookError::PayloadMalformed(_) => {
                StatusCode::BAD_REQUEST
            }

            WebhookError::Ignored(_) => StatusCode::OK,

            WebhookError::AccountUnresolved { .. }
            | WebhookError::ProjectionWriteFailure(_)
            | WebhookError::DeliveryInFlight(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for response bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::SignatureInvalid(_) => "SIGNATURE_INVALID",
            WebhookError::PayloadMalformed(_) => "PAYLOAD_MALFORMED",
            WebhookError::AccountUnresolved { .. } => "ACCOUNT_UNRESOLVED",
            WebhookError::ProjectionWriteFailure(_) => "PROJECTION_WRITE_FAILURE",
            WebhookError::DeliveryInFlight(_) => "DELIVERY_IN_FLIGHT",
            WebhookError::Ignored(_) => "IGNORED",
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        WebhookError::PayloadMalformed(reason.into())
    }
}

impl From<crate::domain::foundation::DomainError> for WebhookError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        WebhookError::ProjectionWriteFailure(err.to_string())
    }
}
