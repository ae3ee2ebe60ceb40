//! Billing webhook signature verification.
//!
//! HMAC-SHA256 over the raw request body, compared in constant time against
//! the digest claimed in the signature header.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::envelope::WebhookEnvelope;
use super::webhook_errors::WebhookError;

/// Header names carrying the signature, in lookup order.
pub const SIGNATURE_HEADERS: [&str; 4] = [
    "webhook-signature",
    "x-webhook-signature",
    "x-polar-signature",
    "x-signature",
];

/// Prefixes stripped from a candidate before hex decoding.
const DIGEST_PREFIXES: [&str; 3] = ["sha256=", "v1=", "v1,"];

/// Parsed signature header: one or more candidate digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub candidates: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses a signature header value.
    ///
    /// Accepts a bare hex digest, `sha256=<hex>`, `v1=<hex>`, `v1,<hex>`, or a
    /// comma/space separated list of those.
    ///
    /// # Errors
    ///
    /// Returns `SignatureInvalid` if no candidate decodes as hex.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let header = header.trim();
        if header.is_empty() {
            return Err(WebhookError::SignatureInvalid("empty header".to_string()));
        }

        // `v1,<hex>` uses the separator itself, so collapse it first.
        let normalized = header.replace("v1,", "v1=");

        let candidates: Vec<Vec<u8>> = normalized
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(|part| {
                let digest = DIGEST_PREFIXES
                    .iter()
                    .find_map(|prefix| part.strip_prefix(prefix))
                    .unwrap_or(part);
                hex::decode(digest).ok().filter(|bytes| !bytes.is_empty())
            })
            .collect();

        if candidates.is_empty() {
            return Err(WebhookError::SignatureInvalid(
                "no hex digest in header".to_string(),
            ));
        }

        Ok(Self { candidates })
    }
}

/// Verifier for billing webhook signatures.
pub struct WebhookSignatureVerifier {
    secret: SecretString,
}

impl WebhookSignatureVerifier {
    /// Creates a new verifier with the shared webhook secret.
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verifies the signature and validates the envelope.
    ///
    /// # Errors
    ///
    /// - `SignatureInvalid` - header absent, malformed, or digest mismatch
    /// - `PayloadMalformed` - body is not a `{type, data}` envelope
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookEnvelope, WebhookError> {
        self.verify(payload, signature_header)?;
        WebhookEnvelope::parse(payload)
    }

    /// Verifies the signature only.
    pub fn verify(&self, payload: &[u8], signature_header: Option<&str>) -> Result<(), WebhookError> {
        let header = signature_header
            .ok_or_else(|| WebhookError::SignatureInvalid("missing signature header".to_string()))?;
        let header = SignatureHeader::parse(header)?;

        let expected = self.compute_signature(payload)?;

        // Evaluate every candidate so timing does not reveal which one matched.
        let matched = header
            .candidates
            .iter()
            .fold(false, |acc, candidate| acc | constant_time_compare(&expected, candidate));

        if matched {
            Ok(())
        } else {
            Err(WebhookError::SignatureInvalid("digest mismatch".to_string()))
        }
    }

    fn compute_signature(&self, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| WebhookError::SignatureInvalid(e.to_string()))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Hex HMAC-SHA256 of a payload, for signing test fixtures.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
