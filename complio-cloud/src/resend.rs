//! Activation emails through the Resend HTTP API.

use crate::error::{CloudError, CloudResult, check_status};
use async_trait::async_trait;
use complio_license::{LicenseKey, Notifier, NotifyResult, Tier, activation_body, activation_subject};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Resend configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ResendConfig {
    /// API key (`re_...`).
    pub api_key: String,
    /// Sender, e.g. `Complio <licenses@complio.dev>`.
    pub from: String,
    /// Base URL for the API (e.g. `https://api.resend.com`).
    pub api_base_url: String,
}

impl Default for ResendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from: "Complio <licenses@complio.dev>".to_string(),
            api_base_url: "https://api.resend.com".to_string(),
        }
    }
}

impl fmt::Debug for ResendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResendConfig")
            .field("api_key", &"[REDACTED]")
            .field("from", &self.from)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct SendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

/// Sends activation emails with Resend.
pub struct ResendNotifier {
    config: ResendConfig,
    client: Client,
}

impl ResendNotifier {
    /// Creates a notifier.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Config`] without an API key.
    pub fn new(config: ResendConfig) -> CloudResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(CloudError::Config("RESEND_API_KEY is empty".to_string()));
        }
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { config, client })
    }

    async fn send(&self, email: &str, license_key: &LicenseKey, tier: Tier) -> CloudResult<()> {
        let body = SendEmail {
            from: &self.config.from,
            to: [email],
            subject: activation_subject(tier),
            text: activation_body(email, license_key, tier),
        };
        let response = self
            .client
            .post(format!("{}/emails", self.config.api_base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response, "send email").await?;
        let sent: SendEmailResponse = response.json().await?;
        info!(email, message_id = ?sent.id, "activation email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    fn provider_name(&self) -> &'static str {
        "Resend"
    }

    async fn send_activation_email(
        &self,
        email: &str,
        license_key: &LicenseKey,
        tier: Tier,
    ) -> NotifyResult<()> {
        Ok(self.send(email, license_key, tier).await?)
    }
}
