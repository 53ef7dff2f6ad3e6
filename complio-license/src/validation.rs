//! License validation.
//!
//! A presented key goes through five checks in a fixed order, each one a
//! terminal rejection:
//!
//! 1. format (no store access, not audited)
//! 2. existence
//! 3. signature over the stored email and tier
//! 4. status must be ACTIVE
//! 5. expiry, if the record has one
//!
//! Status and expiry are only trusted once the signature has checked out.
//! A key that passes all five bumps the validation counter. Audit and
//! counter writes are best-effort and never change the verdict.

use crate::error::LicenseResult;
use crate::key::is_well_formed;
use crate::record::{ClientInfo, LicenseRecord, LicenseStatus, Tier, ValidationLogEntry};
use crate::side_effect::{Effect, best_effort};
use crate::signing;
use crate::store::LicenseStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a key was judged invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MalformedKey,
    NotFound,
    InvalidSignature,
    Inactive(LicenseStatus),
    Expired,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedKey => f.write_str("Invalid license key format"),
            Self::NotFound => f.write_str("License not found"),
            Self::InvalidSignature => f.write_str("Invalid license signature"),
            Self::Inactive(status) => {
                write!(f, "License is {}", status.as_str().to_lowercase())
            }
            Self::Expired => f.write_str("License has expired"),
        }
    }
}

impl Rejection {
    /// Reason written to the audit log. Older rows use these strings, so
    /// they differ slightly from the response text.
    #[must_use]
    pub fn audit_reason(&self) -> String {
        match self {
            Self::InvalidSignature => "Invalid signature".to_string(),
            Self::Inactive(status) => format!("License status is {}", status.as_str()),
            Self::Expired => "License expired".to_string(),
            Self::MalformedKey | Self::NotFound => self.to_string(),
        }
    }
}

/// Result of a validation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid {
        tier: Tier,
        email: String,
        status: LicenseStatus,
    },
    Invalid(Rejection),
}

impl Verdict {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Returns the rejection, if any.
    #[must_use]
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid(r) => Some(*r),
        }
    }
}

/// Public JSON shape of a validation verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LicenseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Verdict> for ValidationResponse {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Valid {
                tier,
                email,
                status,
            } => Self {
                valid: true,
                tier: Some(tier),
                email: Some(email),
                status: Some(status),
                error: None,
            },
            Verdict::Invalid(rejection) => Self {
                valid: false,
                tier: None,
                email: None,
                status: None,
                error: Some(rejection.to_string()),
            },
        }
    }
}

/// Runs the validation checks against an injected store.
pub struct LicenseValidator {
    store: Arc<dyn LicenseStore>,
    signing_key_hex: String,
}

impl LicenseValidator {
    /// Creates a validator. `signing_key_hex` is the hex-encoded signing secret.
    pub fn new(store: Arc<dyn LicenseStore>, signing_key_hex: impl Into<String>) -> Self {
        Self {
            store,
            signing_key_hex: signing_key_hex.into(),
        }
    }

    /// Validates a presented key.
    ///
    /// Invalid keys are an `Ok` verdict; only a failed store lookup is an error.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Store`](crate::LicenseError::Store) if the lookup fails.
    pub async fn validate(&self, raw_key: &str, client: &ClientInfo) -> LicenseResult<Verdict> {
        if !is_well_formed(raw_key) {
            debug!(len = raw_key.len(), "rejecting malformed license key");
            return Ok(Verdict::Invalid(Rejection::MalformedKey));
        }

        let Some(record) = self.store.get_license(raw_key).await? else {
            return Ok(self.reject(raw_key, client, Rejection::NotFound).await);
        };

        if let Some(rejection) = self.check_record(&record) {
            return Ok(self.reject(raw_key, client, rejection).await);
        }

        let next_count = record.validation_count.saturating_add(1);
        best_effort(
            Effect::ValidationCounter,
            raw_key,
            self.store.update_validation_metadata(raw_key, next_count),
        )
        .await;
        self.audit(raw_key, client, None).await;

        info!(license_key = raw_key, tier = %record.tier, count = next_count, "license validated");
        Ok(Verdict::Valid {
            tier: record.tier,
            email: record.email,
            status: record.status,
        })
    }

    /// Signature, status and expiry checks, in that order.
    fn check_record(&self, record: &LicenseRecord) -> Option<Rejection> {
        let key = record.license_key.as_str();
        if !signing::verify(
            key,
            &record.email,
            record.tier.as_str(),
            &record.signature,
            &self.signing_key_hex,
        ) {
            return Some(Rejection::InvalidSignature);
        }

        if !record.status.is_active() {
            return Some(Rejection::Inactive(record.status));
        }

        match record.expiry() {
            Some(Ok(expires_at)) if expires_at < Utc::now() => Some(Rejection::Expired),
            Some(Err(e)) => {
                // Signature already passed; an unreadable expiry does not block.
                warn!(license_key = key, error = %e, "unparseable expiry, treating as non-expired");
                None
            }
            _ => None,
        }
    }

    async fn reject(&self, raw_key: &str, client: &ClientInfo, rejection: Rejection) -> Verdict {
        let reason = rejection.audit_reason();
        debug!(license_key = raw_key, %reason, "license rejected");
        self.audit(raw_key, client, Some(&reason)).await;
        Verdict::Invalid(rejection)
    }

    async fn audit(&self, raw_key: &str, client: &ClientInfo, error: Option<&str>) {
        let entry = ValidationLogEntry::new(raw_key, error.is_none(), client, error);
        best_effort(
            Effect::AuditLog,
            raw_key,
            self.store.append_validation_log(&entry),
        )
        .await;
    }
}
