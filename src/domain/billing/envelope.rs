//! Webhook envelope validation.

use serde_json::{Map, Value};

use super::webhook_errors::WebhookError;

/// A structurally valid `{type, data}` webhook body.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEnvelope {
    pub event_type: String,
    pub data: Map<String, Value>,
}

impl WebhookEnvelope {
    /// Parses the raw body and checks the envelope shape.
    ///
    /// # Errors
    ///
    /// `PayloadMalformed` if the body is not JSON, `type` is not a non-empty
    /// string, or `data` is not an object.
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::malformed(format!("invalid JSON: {}", e)))?;

        let Value::Object(mut body) = value else {
            return Err(WebhookError::malformed("envelope must be an object"));
        };

        let event_type = match body.remove("type") {
            Some(Value::String(t)) if !t.trim().is_empty() => t,
            Some(_) => return Err(WebhookError::malformed("field 'type' must be a string")),
            None => return Err(WebhookError::malformed("missing field 'type'")),
        };

        let data = match body.remove("data") {
            Some(Value::Object(data)) => data,
            Some(_) => return Err(WebhookError::malformed("field 'data' must be an object")),
            None => return Err(WebhookError::malformed("missing field 'data'")),
        };

        Ok(Self { event_type, data })
    }

    /// Looks up a top-level data field by any of the given names.
    pub fn data_field(&self, names: &[&str]) -> Option<&Value> {
        names.iter().find_map(|name| self.data.get(*name))
    }
}
