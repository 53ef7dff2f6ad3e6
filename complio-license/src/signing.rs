//! HMAC-SHA256 signatures binding a license key to its owner and tier.
//!
//! The signed message is `key|email|tier`. Field order and the pipe
//! delimiter are fixed: changing either invalidates every license issued
//! before the change.

use crate::error::{LicenseError, LicenseResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-encoded signature.
pub const SIGNATURE_HEX_LEN: usize = 64;

/// Server-held signing key, decoded from its hex representation.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecret {
    bytes: Vec<u8>,
}

impl SigningSecret {
    /// Decodes a hex-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidSecretEncoding`] if `secret_hex` is not valid hex.
    pub fn from_hex(secret_hex: &str) -> LicenseResult<Self> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| LicenseError::InvalidSecretEncoding(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Computes the lowercase hex signature for a license.
    #[must_use]
    pub fn sign(&self, key: &str, email: &str, tier: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.bytes).expect("HMAC can take key of any size");
        mac.update(signing_message(key, email, tier).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Checks `signature` against the recomputed value in constant time.
    #[must_use]
    pub fn verify(&self, key: &str, email: &str, tier: &str, signature: &str) -> bool {
        let expected = self.sign(key, email, tier);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Builds the authenticated message for a license.
#[must_use]
pub fn signing_message(key: &str, email: &str, tier: &str) -> String {
    format!("{key}|{email}|{tier}")
}

/// Signs a license with a hex-encoded secret.
///
/// # Errors
///
/// Returns [`LicenseError::InvalidSecretEncoding`] if `secret_hex` is not valid hex.
pub fn sign(key: &str, email: &str, tier: &str, secret_hex: &str) -> LicenseResult<String> {
    Ok(SigningSecret::from_hex(secret_hex)?.sign(key, email, tier))
}

/// Verifies a license signature. Fails closed: a malformed secret yields `false`.
#[must_use]
pub fn verify(key: &str, email: &str, tier: &str, signature: &str, secret_hex: &str) -> bool {
    match SigningSecret::from_hex(secret_hex) {
        Ok(secret) => secret.verify(key, email, tier, signature),
        Err(e) => {
            tracing::warn!(error = %e, "signature check failed closed");
            false
        }
    }
}
