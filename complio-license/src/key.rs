//! License key generation and format checks.
//!
//! Keys use the format: `COMPL-XXXX-XXXX-XXXX-XXXX`
//!
//! The payload is 8 bytes drawn from the operating system CSPRNG, rendered
//! as 16 uppercase hex digits in four groups. Keys are unguessable but not
//! guaranteed unique; the store enforces uniqueness.

use crate::error::{LicenseError, LicenseResult};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Fixed literal tag at the start of every key.
pub const KEY_PREFIX: &str = "COMPL";

/// Random payload size in bytes (64 bits).
pub const KEY_PAYLOAD_BYTES: usize = 8;

const GROUPS: usize = 4;
const GROUP_LEN: usize = 4;

/// Total key length: prefix, four hyphens, sixteen hex digits.
pub const KEY_LEN: usize = KEY_PREFIX.len() + GROUPS * (GROUP_LEN + 1);

/// A license key that passed the format check.
///
/// Deserialization runs the same check as [`LicenseKey::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Generates a fresh key from 8 bytes of OS randomness.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_PAYLOAD_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self::from_payload(&bytes)
    }

    /// Renders a key from a known payload.
    #[must_use]
    pub fn from_payload(bytes: &[u8; KEY_PAYLOAD_BYTES]) -> Self {
        let hex = hex::encode_upper(bytes);
        let groups: Vec<&str> = (0..GROUPS)
            .map(|i| &hex[i * GROUP_LEN..(i + 1) * GROUP_LEN])
            .collect();
        Self(format!("{KEY_PREFIX}-{}", groups.join("-")))
    }

    /// Parses a presented key, rejecting anything that is not well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidKeyFormat`] when the prefix or length is wrong.
    pub fn parse(raw: &str) -> LicenseResult<Self> {
        if !is_well_formed(raw) {
            return Err(LicenseError::InvalidKeyFormat(format!(
                "expected {KEY_PREFIX}- prefix and {KEY_LEN} characters"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the hex groups back into the random payload.
    ///
    /// Returns `None` for keys that are well-formed but not hex (the format
    /// check only looks at prefix and length).
    #[must_use]
    pub fn payload(&self) -> Option<[u8; KEY_PAYLOAD_BYTES]> {
        let digits: String = self
            .0
            .get(KEY_PREFIX.len()..)?
            .chars()
            .filter(|c| *c != '-')
            .collect();
        let mut out = [0u8; KEY_PAYLOAD_BYTES];
        hex::decode_to_slice(digits, &mut out).ok()?;
        Some(out)
    }
}

impl<'de> Deserialize<'de> for LicenseKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LicenseKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Cheap shape check run before any store lookup or signature work.
///
/// A key is well-formed iff it is ASCII, starts with `COMPL-` and has
/// exactly [`KEY_LEN`] characters.
#[must_use]
pub fn is_well_formed(raw: &str) -> bool {
    raw.is_ascii()
        && raw.len() == KEY_LEN
        && raw
            .strip_prefix(KEY_PREFIX)
            .is_some_and(|rest| rest.starts_with('-'))
}
