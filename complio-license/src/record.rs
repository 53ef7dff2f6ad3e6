//! Persisted license records and validation audit entries.

use crate::error::LicenseError;
use crate::key::LicenseKey;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

/// Product plan attached to a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Pre-release access.
    EarlyAccess,
    /// Baseline plan, used when checkout carries no tier.
    #[default]
    Starter,
    /// Professional plan.
    Pro,
    /// Enterprise plan.
    Enterprise,
}

impl Tier {
    /// All known tiers.
    pub const ALL: [Tier; 4] = [Tier::EarlyAccess, Tier::Starter, Tier::Pro, Tier::Enterprise];

    /// Wire label; this is the value covered by the license signature.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EarlyAccess => "EARLY_ACCESS",
            Self::Starter => "STARTER",
            Self::Pro => "PRO",
            Self::Enterprise => "ENTERPRISE",
        }
    }

    /// Human-facing name, e.g. "Early Access".
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::EarlyAccess => "Early Access",
            Self::Starter => "Starter",
            Self::Pro => "Pro",
            Self::Enterprise => "Enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Tier {
    /// Exact match on the wire label, as stored and signed.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::UnknownTier`] for anything but a canonical label.
    pub fn from_label(label: &str) -> Result<Self, LicenseError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == label)
            .ok_or_else(|| LicenseError::UnknownTier(label.to_string()))
    }
}

/// Lenient parse for labels typed by people (checkout metadata): trims and
/// ignores case. Stored records go through [`Tier::from_label`].
impl FromStr for Tier {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(&s.trim().to_ascii_uppercase())
            .map_err(|_| LicenseError::UnknownTier(s.to_string()))
    }
}

/// Lifecycle state of a license, driven by billing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
    Active,
    Suspended,
    Cancelled,
}

impl LicenseStatus {
    /// Stored label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns true if validation may succeed in this state.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "SUSPENDED" => Ok(Self::Suspended),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(LicenseError::UnknownStatus(other.to_string())),
        }
    }
}

/// Metadata keys held by named [`LicenseMetadata`] fields.
pub const RESERVED_METADATA_KEYS: [&str; 2] = ["stripe_session_id", "created_via"];

/// Where a license came from. Extra billing fields land in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LicenseMetadata {
    /// Billing event or checkout session that triggered issuance.
    #[serde(rename = "stripe_session_id", default, skip_serializing_if = "Option::is_none")]
    pub origin_event_id: Option<String>,
    /// Creation channel, e.g. `stripe_webhook`.
    #[serde(default)]
    pub created_via: String,
    /// Opaque fields carried over from the billing provider.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LicenseMetadata {
    /// Builds metadata, dropping reserved keys from `extra`.
    #[must_use]
    pub fn new(
        origin_event_id: Option<String>,
        created_via: impl Into<String>,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            origin_event_id,
            created_via: created_via.into(),
            extra,
        }
        .without_reserved_extra()
    }

    /// Removes `extra` entries that would collide with the named fields
    /// once flattened.
    #[must_use]
    pub fn without_reserved_extra(mut self) -> Self {
        for key in RESERVED_METADATA_KEYS {
            if self.extra.remove(key).is_some() {
                debug!(key, "dropping reserved key from license metadata");
            }
        }
        self
    }
}

/// A stored license.
///
/// Key, email, tier and signature are fixed at issuance. Status and the
/// validation counters change over the record's lifetime; records are never
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub license_key: LicenseKey,
    pub email: String,
    pub tier: Tier,
    pub status: LicenseStatus,
    /// Lowercase hex HMAC-SHA256 over `key|email|tier`.
    pub signature: String,
    /// Expiry as stored (RFC 3339, or naive ISO 8601 in UTC). `None` never expires.
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub validation_count: u64,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub last_validated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_id: Option<String>,
    #[serde(default)]
    pub metadata: LicenseMetadata,
}

impl LicenseRecord {
    /// Parses the stored expiry, if any.
    #[must_use]
    pub fn expiry(&self) -> Option<Result<DateTime<Utc>, chrono::ParseError>> {
        self.expires_at.as_deref().map(parse_timestamp)
    }
}

/// Parses an RFC 3339 timestamp, accepting naive ISO 8601 as UTC.
///
/// # Errors
///
/// Returns the RFC 3339 parse error when neither form matches.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| rfc_err),
    }
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_timestamp(&raw).map_err(serde::de::Error::custom))
        .transpose()
}

/// One row of the append-only validation audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationLogEntry {
    pub id: Uuid,
    /// The presented key; may not match any stored license.
    pub license_key: String,
    pub validated_at: DateTime<Utc>,
    pub success: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub error_message: Option<String>,
}

impl ValidationLogEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(license_key: &str, success: bool, client: &ClientInfo, error: Option<&str>) -> Self {
        Self {
            id: Uuid::now_v7(),
            license_key: license_key.to_string(),
            validated_at: Utc::now(),
            success,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            error_message: error.map(str::to_string),
        }
    }
}

/// Caller details recorded with each validation attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
