//! In-process [`LicenseStore`], used for tests and local runs.

use crate::error::{StoreError, StoreResult};
use crate::record::{LicenseRecord, LicenseStatus, ValidationLogEntry};
use crate::store::LicenseStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// License store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryLicenseStore {
    licenses: RwLock<HashMap<String, LicenseRecord>>,
    validations: RwLock<Vec<ValidationLogEntry>>,
}

impl MemoryLicenseStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the audit log in insertion order.
    pub async fn validation_log(&self) -> Vec<ValidationLogEntry> {
        self.validations.read().await.clone()
    }

    /// Returns the number of stored licenses.
    pub async fn license_count(&self) -> usize {
        self.licenses.read().await.len()
    }

    /// Overwrites a record in place, bypassing the insert-once rule.
    pub async fn put_raw(&self, record: LicenseRecord) {
        self.licenses
            .write()
            .await
            .insert(record.license_key.as_str().to_string(), record);
    }
}

#[async_trait]
impl LicenseStore for MemoryLicenseStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert_license(&self, record: &LicenseRecord) -> StoreResult<LicenseRecord> {
        let mut licenses = self.licenses.write().await;
        let key = record.license_key.as_str();
        if licenses.contains_key(key) {
            return Err(StoreError::Conflict(key.to_string()));
        }
        licenses.insert(key.to_string(), record.clone());
        Ok(record.clone())
    }

    async fn get_license(&self, license_key: &str) -> StoreResult<Option<LicenseRecord>> {
        Ok(self.licenses.read().await.get(license_key).cloned())
    }

    async fn get_license_by_subscription(
        &self,
        subscription_id: &str,
    ) -> StoreResult<Option<LicenseRecord>> {
        Ok(self
            .licenses
            .read()
            .await
            .values()
            .find(|r| r.stripe_subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    async fn update_license_status(
        &self,
        license_key: &str,
        status: LicenseStatus,
    ) -> StoreResult<LicenseRecord> {
        let mut licenses = self.licenses.write().await;
        let record = licenses
            .get_mut(license_key)
            .ok_or_else(|| StoreError::NotFound(license_key.to_string()))?;
        record.status = status;
        record.last_validated_at = Some(Utc::now());
        Ok(record.clone())
    }

    async fn update_validation_metadata(
        &self,
        license_key: &str,
        validation_count: u64,
    ) -> StoreResult<LicenseRecord> {
        let mut licenses = self.licenses.write().await;
        let record = licenses
            .get_mut(license_key)
            .ok_or_else(|| StoreError::NotFound(license_key.to_string()))?;
        record.validation_count = validation_count;
        record.last_validated_at = Some(Utc::now());
        Ok(record.clone())
    }

    async fn append_validation_log(&self, entry: &ValidationLogEntry) -> StoreResult<()> {
        self.validations.write().await.push(entry.clone());
        Ok(())
    }
}
