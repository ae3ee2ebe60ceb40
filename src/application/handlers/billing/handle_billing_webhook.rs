//! HandleBillingWebhookHandler - verifies, normalizes, and reconciles one delivery.

use std::sync::Arc;

use crate::domain::billing::{EventNormalizer, WebhookError, WebhookSignatureVerifier};
use crate::domain::foundation::Timestamp;

use super::reconcile_event::{ReconcileEventHandler, ReconcileOutcome};

/// Command to handle a billing webhook delivery.
#[derive(Debug, Clone)]
pub struct HandleBillingWebhookCommand {
    /// Raw request body, exactly as received.
    pub payload: Vec<u8>,
    /// Value of the first signature header present, if any.
    pub signature: Option<String>,
}

pub struct HandleBillingWebhookHandler {
    verifier: WebhookSignatureVerifier,
    normalizer: EventNormalizer,
    reconciler: Arc<ReconcileEventHandler>,
}

impl HandleBillingWebhookHandler {
    pub fn new(
        verifier: WebhookSignatureVerifier,
        normalizer: EventNormalizer,
        reconciler: Arc<ReconcileEventHandler>,
    ) -> Self {
        Self {
            verifier,
            normalizer,
            reconciler,
        }
    }

    /// Processes one delivery.
    ///
    /// `Ignored` is folded into a successful outcome; every `Err` maps to a
    /// non-2xx status via [`WebhookError::status_code`].
    pub async fn handle(
        &self,
        cmd: HandleBillingWebhookCommand,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let envelope = self
            .verifier
            .verify_and_parse(&cmd.payload, cmd.signature.as_deref())
            .map_err(|e| {
                tracing::warn!(code = e.code(), error = %e, "Webhook rejected");
                e
            })?;

        let event = match self.normalizer.normalize(&envelope) {
            Ok(event) => event,
            Err(WebhookError::Ignored(reason)) => {
                tracing::debug!(event_type = %envelope.event_type, reason = %reason, "Webhook ignored");
                return Ok(ReconcileOutcome::Ignored { reason });
            }
            Err(e) => {
                tracing::warn!(event_type = %envelope.event_type, error = %e, "Webhook payload malformed");
                return Err(e);
            }
        };

        match self.reconciler.handle(&event, Timestamp::now()).await {
            Err(WebhookError::Ignored(reason)) => Ok(ReconcileOutcome::Ignored { reason }),
            other => other,
        }
    }
}
