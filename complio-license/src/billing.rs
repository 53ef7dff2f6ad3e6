//! Billing provider webhooks: origin verification and checkout parsing.
//!
//! Webhooks carry a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`. The signature is
//! HMAC-SHA256 over `"{t}.{payload}"` keyed by the raw webhook secret.

use crate::error::{LicenseError, LicenseResult};
use crate::issuance::IssueRequest;
use crate::record::{LicenseMetadata, Tier};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Maximum clock skew accepted between the signature timestamp and now.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Name of the request header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Event type that triggers license issuance.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Creation channel recorded on webhook-issued licenses.
pub const CREATED_VIA_WEBHOOK: &str = "stripe_webhook";

fn webhook_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Computes the `v1` signature for a payload.
#[must_use]
pub fn compute_webhook_signature(payload: &[u8], secret: &str, timestamp: i64) -> String {
    hex::encode(webhook_mac(secret, timestamp, payload).finalize().into_bytes())
}

/// Builds a complete signature header, as the provider would send it.
#[must_use]
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    format!(
        "t={timestamp},v1={}",
        compute_webhook_signature(payload, secret, timestamp)
    )
}

/// Checks that `payload` was signed by the billing provider.
///
/// # Errors
///
/// Returns [`LicenseError::WebhookSignature`] if the header is malformed, no
/// `v1` entry matches, or the timestamp is outside the tolerance window.
pub fn verify_webhook(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> LicenseResult<()> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return Err(LicenseError::WebhookSignature(
            "unable to extract timestamp from header".to_string(),
        ));
    };
    if candidates.is_empty() {
        return Err(LicenseError::WebhookSignature(
            "no v1 signatures found in header".to_string(),
        ));
    }

    let expected = compute_webhook_signature(payload, secret, timestamp);
    let matched = candidates
        .iter()
        .any(|c| bool::from(expected.as_bytes().ct_eq(c.as_bytes())));
    if !matched {
        return Err(LicenseError::WebhookSignature(
            "no signatures found matching the expected signature for payload".to_string(),
        ));
    }

    if (now.timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(LicenseError::WebhookSignature(
            "timestamp outside the tolerance zone".to_string(),
        ));
    }
    Ok(())
}

/// A verified billing event.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl BillingEvent {
    /// Parses an event body.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Serialization`] if the body is not an event.
    pub fn parse(payload: &[u8]) -> LicenseResult<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Returns the checkout session for `checkout.session.completed` events.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Serialization`] if the session object is malformed.
    pub fn checkout_session(&self) -> LicenseResult<Option<CheckoutSession>> {
        if self.event_type != CHECKOUT_COMPLETED {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(self.data.object.clone())?))
    }
}

/// The fields of a completed checkout that issuance needs.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Billing customer reference.
    #[serde(default)]
    pub customer: Option<String>,
    /// Billing subscription reference.
    #[serde(default)]
    pub subscription: Option<String>,
    /// Checkout metadata; everything except `tier` is kept on the license.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CheckoutSession {
    /// Tier from `metadata.tier`, defaulting to the baseline tier.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::UnknownTier`] for an unrecognised label.
    pub fn tier(&self) -> LicenseResult<Tier> {
        match self.metadata.get("tier").and_then(|v| v.as_str()) {
            Some(label) => label.parse(),
            None => Ok(Tier::default()),
        }
    }

    /// Converts the session into an issuance request.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::MissingField`] without a payer email, or
    /// [`LicenseError::UnknownTier`] for an unrecognised tier label.
    pub fn into_issue_request(self) -> LicenseResult<IssueRequest> {
        let email = self
            .customer_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .ok_or(LicenseError::MissingField("customer_email"))?;
        let tier = self.tier()?;

        let mut extra = self.metadata;
        extra.remove("tier");

        Ok(IssueRequest {
            email,
            tier,
            customer_id: self.customer,
            subscription_id: self.subscription,
            expires_at: None,
            metadata: LicenseMetadata::new(Some(self.id), CREATED_VIA_WEBHOOK, extra),
        })
    }
}
