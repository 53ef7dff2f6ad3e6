//! PostgREST license store.
//!
//! Talks to the `licenses` and `validations` tables through the REST
//! interface Supabase exposes under `/rest/v1`.

use crate::error::{CloudError, CloudResult, check_status};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use complio_license::{
    LicenseRecord, LicenseStatus, LicenseStore, StoreResult, ValidationLogEntry,
};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Connection settings for a PostgREST backend.
#[derive(Clone)]
pub struct RestStoreConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    /// Service-role key, sent as both `apikey` and bearer token.
    pub service_key: String,
    pub licenses_table: String,
    pub validations_table: String,
    pub timeout: Duration,
}

impl RestStoreConfig {
    /// Config for the given project with default table names.
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            service_key: service_key.into(),
            licenses_table: "licenses".to_string(),
            validations_table: "validations".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for RestStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestStoreConfig")
            .field("base_url", &self.base_url)
            .field("service_key", &"[REDACTED]")
            .field("licenses_table", &self.licenses_table)
            .field("validations_table", &self.validations_table)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// License store backed by a PostgREST API.
pub struct RestLicenseStore {
    config: RestStoreConfig,
    client: Client,
}

impl RestLicenseStore {
    /// Creates a store client.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Config`] if the URL or key is empty.
    pub fn new(config: RestStoreConfig) -> CloudResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(CloudError::Config("database URL is empty".to_string()));
        }
        if config.service_key.trim().is_empty() {
            return Err(CloudError::Config("database service key is empty".to_string()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.base_url.trim_end_matches('/'))
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    async fn send_rows<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> CloudResult<Vec<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| CloudError::Api(format!("{context}: {e}")))?;
        let response = check_status(response, context).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn select_one(&self, filter: &[(&str, String)]) -> CloudResult<Option<LicenseRecord>> {
        let request = self
            .request(Method::GET, &self.config.licenses_table)
            .query(&[("select", "*")])
            .query(filter);
        let mut rows: Vec<LicenseRecord> = self.send_rows(request, "license lookup").await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }

    async fn patch_license(
        &self,
        license_key: &str,
        changes: serde_json::Value,
        context: &str,
    ) -> CloudResult<LicenseRecord> {
        let request = self
            .request(Method::PATCH, &self.config.licenses_table)
            .query(&[("license_key", format!("eq.{license_key}"))])
            .header("Prefer", "return=representation")
            .json(&changes);
        let mut rows: Vec<LicenseRecord> = self.send_rows(request, context).await?;
        if rows.is_empty() {
            return Err(CloudError::NotFound(license_key.to_string()));
        }
        Ok(rows.swap_remove(0))
    }
}

fn now_text() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl LicenseStore for RestLicenseStore {
    fn backend_name(&self) -> &'static str {
        "postgrest"
    }

    async fn insert_license(&self, record: &LicenseRecord) -> StoreResult<LicenseRecord> {
        let request = self
            .request(Method::POST, &self.config.licenses_table)
            .header("Prefer", "return=representation")
            .json(record);
        let mut rows: Vec<LicenseRecord> = match self.send_rows(request, "license insert").await {
            Ok(rows) => rows,
            Err(CloudError::Conflict(_)) => {
                return Err(CloudError::Conflict(record.license_key.to_string()).into());
            }
            Err(e) => return Err(e.into()),
        };
        debug!(license_key = %record.license_key, "license row created");
        Ok(if rows.is_empty() {
            record.clone()
        } else {
            rows.swap_remove(0)
        })
    }

    async fn get_license(&self, license_key: &str) -> StoreResult<Option<LicenseRecord>> {
        Ok(self
            .select_one(&[("license_key", format!("eq.{license_key}"))])
            .await?)
    }

    async fn get_license_by_subscription(
        &self,
        subscription_id: &str,
    ) -> StoreResult<Option<LicenseRecord>> {
        Ok(self
            .select_one(&[
                ("stripe_subscription_id", format!("eq.{subscription_id}")),
                ("order", "created_at.desc".to_string()),
                ("limit", "1".to_string()),
            ])
            .await?)
    }

    async fn update_license_status(
        &self,
        license_key: &str,
        status: LicenseStatus,
    ) -> StoreResult<LicenseRecord> {
        let changes = serde_json::json!({
            "status": status,
            "last_validated_at": now_text(),
        });
        Ok(self
            .patch_license(license_key, changes, "license status update")
            .await?)
    }

    async fn update_validation_metadata(
        &self,
        license_key: &str,
        validation_count: u64,
    ) -> StoreResult<LicenseRecord> {
        let changes = serde_json::json!({
            "validation_count": validation_count,
            "last_validated_at": now_text(),
        });
        Ok(self
            .patch_license(license_key, changes, "validation counter update")
            .await?)
    }

    async fn append_validation_log(&self, entry: &ValidationLogEntry) -> StoreResult<()> {
        let response = self
            .request(Method::POST, &self.config.validations_table)
            .header("Prefer", "return=minimal")
            .json(entry)
            .send()
            .await
            .map_err(|e| CloudError::Api(format!("validation log insert: {e}")))?;
        check_status(response, "validation log insert").await?;
        Ok(())
    }
}
