//! License issuance: mint, sign, persist, notify.

use crate::error::{LicenseError, LicenseResult, StoreError};
use crate::key::LicenseKey;
use crate::notify::Notifier;
use crate::record::{LicenseMetadata, LicenseRecord, LicenseStatus, Tier};
use crate::side_effect::{Effect, best_effort};
use crate::signing::SigningSecret;
use crate::store::LicenseStore;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Term of a license issued without an explicit expiry (monthly subscription).
pub const DEFAULT_TERM_DAYS: i64 = 30;

/// Fresh keys tried before giving up on a unique-key conflict.
pub const MAX_KEY_ATTEMPTS: u32 = 3;

/// What to issue and for whom.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRequest {
    pub email: String,
    pub tier: Tier,
    /// Billing customer reference.
    pub customer_id: Option<String>,
    /// Billing subscription reference.
    pub subscription_id: Option<String>,
    /// Overrides the default term when set.
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: LicenseMetadata,
}

/// A persisted license plus the outcome of the activation email.
#[derive(Debug, Clone)]
pub struct IssuedLicense {
    pub record: LicenseRecord,
    pub email_sent: bool,
}

/// Issues licenses against an injected store and notifier.
pub struct LicenseIssuer {
    store: Arc<dyn LicenseStore>,
    notifier: Arc<dyn Notifier>,
    secret: SigningSecret,
}

impl LicenseIssuer {
    /// Creates an issuer.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidSecretEncoding`] if `signing_key_hex` is not hex.
    pub fn new(
        store: Arc<dyn LicenseStore>,
        notifier: Arc<dyn Notifier>,
        signing_key_hex: &str,
    ) -> LicenseResult<Self> {
        Ok(Self {
            store,
            notifier,
            secret: SigningSecret::from_hex(signing_key_hex)?,
        })
    }

    /// Builds the record for a new key without persisting it.
    #[must_use]
    pub fn build_record(&self, key: LicenseKey, request: &IssueRequest) -> LicenseRecord {
        let expires_at = request
            .expires_at
            .unwrap_or_else(|| Utc::now() + Duration::days(DEFAULT_TERM_DAYS));
        let signature = self
            .secret
            .sign(key.as_str(), &request.email, request.tier.as_str());

        LicenseRecord {
            license_key: key,
            email: request.email.clone(),
            tier: request.tier,
            status: LicenseStatus::Active,
            signature,
            expires_at: Some(expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            validation_count: 0,
            last_validated_at: None,
            stripe_customer_id: request.customer_id.clone(),
            stripe_subscription_id: request.subscription_id.clone(),
            metadata: request.metadata.clone().without_reserved_extra(),
        }
    }

    /// Issues a license and sends the activation email.
    ///
    /// The email is best-effort: a failed send leaves the license in place
    /// and is reported through [`IssuedLicense::email_sent`].
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Store`] if the insert fails, or
    /// [`LicenseError::KeyCollision`] if every generated key was taken.
    pub async fn issue(&self, request: IssueRequest) -> LicenseResult<IssuedLicense> {
        let record = self.insert_with_fresh_key(&request).await?;
        info!(
            license_key = %record.license_key,
            tier = %record.tier,
            backend = self.store.backend_name(),
            "license issued"
        );

        let sent = best_effort(
            Effect::ActivationEmail,
            record.license_key.as_str(),
            self.notifier
                .send_activation_email(&record.email, &record.license_key, record.tier),
        )
        .await;

        Ok(IssuedLicense {
            record,
            email_sent: sent.is_done(),
        })
    }

    async fn insert_with_fresh_key(&self, request: &IssueRequest) -> LicenseResult<LicenseRecord> {
        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let record = self.build_record(LicenseKey::generate(), request);
            match self.store.insert_license(&record).await {
                Ok(stored) => return Ok(stored),
                Err(StoreError::Conflict(key)) => {
                    warn!(license_key = %key, attempt, "license key collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LicenseError::KeyCollision(MAX_KEY_ATTEMPTS))
    }
}
