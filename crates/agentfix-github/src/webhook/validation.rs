//! Webhook signature validation.
//!
//! GitHub signs each delivery with HMAC-SHA256 over the raw request body and
//! sends the result as `X-Hub-Signature-256: sha256=<hex>`. The check must run
//! on the exact bytes received, before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::ValidationError;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify a webhook signature header against the raw body.
///
/// Returns `false` when the header is absent, lacks the `sha256=` prefix,
/// carries malformed hex or does not match. Lengths are compared first, then
/// bytes are compared in constant time.
///
/// # Examples
///
/// ```
/// use agentfix_github::webhook::verify_signature;
///
/// assert!(!verify_signature(b"{}", None, "secret"));
/// assert!(!verify_signature(b"{}", Some("sha1=abc"), "secret"));
/// ```
pub fn verify_signature(raw_body: &[u8], signature_header: Option<&str>, secret: &str) -> bool {
    let Some(header) = signature_header else {
        return false;
    };

    let provided = match parse_signature(header) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let expected = match compute_hmac(raw_body, secret) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    constant_time_compare(&provided, &expected)
}

/// Compute the `sha256=<hex>` header value for `raw_body`.
///
/// # Errors
///
/// Returns `ValidationError::HmacError` if the HMAC cannot be keyed.
pub fn sign_payload(raw_body: &[u8], secret: &str) -> Result<String, ValidationError> {
    let mac = compute_hmac(raw_body, secret)?;
    Ok(format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac)))
}

fn parse_signature(signature: &str) -> Result<Vec<u8>, ValidationError> {
    let Some(hex_signature) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return Err(ValidationError::InvalidSignatureFormat {
            message: format!("Signature must start with '{}'", SIGNATURE_PREFIX),
        });
    };

    hex::decode(hex_signature).map_err(|e| ValidationError::InvalidSignatureFormat {
        message: format!("Invalid hex encoding in signature: {}", e),
    })
}

fn compute_hmac(payload: &[u8], secret: &str) -> Result<Vec<u8>, ValidationError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| ValidationError::HmacError {
            message: format!("Failed to create HMAC instance: {}", e),
        })?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    // Length is not secret.
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Validates GitHub webhook signatures with a fixed secret.
///
/// Never logs the secret or signature values.
#[derive(Clone)]
pub struct SignatureValidator {
    secret: Zeroizing<String>,
}

impl SignatureValidator {
    /// Create a validator for `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
        }
    }

    /// Validate `signature_header` against the raw `payload`.
    pub fn validate(&self, payload: &[u8], signature_header: Option<&str>) -> bool {
        verify_signature(payload, signature_header, &self.secret)
    }
}

impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
