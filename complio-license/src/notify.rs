//! Activation email interface.

use crate::error::{NotifyError, NotifyResult};
use crate::key::LicenseKey;
use crate::record::Tier;
use async_trait::async_trait;

/// Delivers the activation email for a freshly issued license.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns the name of the provider, for logs.
    fn provider_name(&self) -> &'static str;

    /// Sends the license key to its owner.
    async fn send_activation_email(
        &self,
        email: &str,
        license_key: &LicenseKey,
        tier: Tier,
    ) -> NotifyResult<()>;
}

/// Notifier used when no email provider is configured. Every send fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    fn provider_name(&self) -> &'static str {
        "disabled"
    }

    async fn send_activation_email(
        &self,
        _email: &str,
        _license_key: &LicenseKey,
        _tier: Tier,
    ) -> NotifyResult<()> {
        Err(NotifyError::NotConfigured(
            "no email API key configured".to_string(),
        ))
    }
}

/// Subject line of the activation email.
#[must_use]
pub fn activation_subject(tier: Tier) -> String {
    format!("Your Complio {} License is Ready", tier.display_name())
}

/// Plain-text body of the activation email.
#[must_use]
pub fn activation_body(email: &str, license_key: &LicenseKey, tier: Tier) -> String {
    format!(
        "Welcome to Complio!\n\n\
         Your License Key: {license_key}\n\n\
         Plan: {plan}\n\
         Email: {email}\n\
         Status: Active\n\n\
         Activate with:\n  complio activate --license-key {license_key}\n\n\
         This license key is personal and confidential. Do not share it with others.\n",
        plan = tier.display_name(),
    )
}
