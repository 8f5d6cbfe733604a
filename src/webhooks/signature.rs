//! GitHub webhook signature verification using HMAC-SHA256.
//!
//! GitHub signs each delivery with the App's webhook secret and sends the
//! result in `X-Hub-Signature-256` as `sha256=<hex>`. Deliveries are verified
//! against the raw body before anything is parsed.

use std::fmt;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a delivery failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing X-Hub-Signature-256 header")]
    Missing,

    #[error("malformed signature header")]
    Malformed,

    #[error("signature does not match payload")]
    Mismatch,
}

/// The shared secret configured on the GitHub App.
#[derive(Clone)]
pub struct WebhookSecret(SecretString);

impl WebhookSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        WebhookSecret(SecretString::from(secret.into()))
    }

    fn mac(&self) -> Result<HmacSha256, SignatureError> {
        HmacSha256::new_from_slice(self.0.expose_secret().as_bytes())
            .map_err(|_| SignatureError::Malformed)
    }

    /// Computes the `X-Hub-Signature-256` value GitHub would send for `payload`.
    ///
    /// ```
    /// use docker_lock_bot::webhooks::WebhookSecret;
    ///
    /// let secret = WebhookSecret::new("It's a Secret to Everybody");
    /// assert_eq!(
    ///     secret.sign(b"Hello, World!").unwrap(),
    ///     "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
    /// );
    /// ```
    pub fn sign(&self, payload: &[u8]) -> Result<String, SignatureError> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
    }

    /// Verifies a delivery. `header` is the raw `X-Hub-Signature-256` value.
    ///
    /// Comparison is constant-time.
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::Missing)?;
        let expected = parse_signature_header(header).ok_or(SignatureError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(<redacted>)")
    }
}

/// Decodes `sha256=<hex>` into raw bytes. Any other shape is `None`.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.trim().strip_prefix("sha256=")?;
    if hex_sig.is_empty() {
        return None;
    }
    hex::decode(hex_sig).ok()
}
