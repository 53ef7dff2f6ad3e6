//! Shared test helpers for license tests.

#![allow(dead_code)]

use async_trait::async_trait;
use complio_license::{
    LicenseKey, LicenseMetadata, LicenseRecord, LicenseStatus, LicenseStore, MemoryLicenseStore,
    NotifyError, NotifyResult, Notifier, SigningSecret, StoreError, StoreResult, Tier,
    ValidationLogEntry,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// 32-byte signing secret, hex-encoded.
pub const TEST_SECRET_HEX: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

pub const TEST_EMAIL: &str = "ops@example.com";

/// A fixed, well-formed key.
pub fn test_key() -> LicenseKey {
    LicenseKey::from_payload(&[0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x23, 0x45, 0x67])
}

/// Builds a correctly signed record.
pub fn signed_record(
    key: &LicenseKey,
    tier: Tier,
    status: LicenseStatus,
    expires_at: Option<String>,
) -> LicenseRecord {
    let secret = SigningSecret::from_hex(TEST_SECRET_HEX).unwrap();
    LicenseRecord {
        license_key: key.clone(),
        email: TEST_EMAIL.to_string(),
        tier,
        status,
        signature: secret.sign(key.as_str(), TEST_EMAIL, tier.as_str()),
        expires_at,
        validation_count: 0,
        last_validated_at: None,
        stripe_customer_id: Some("cus_123".to_string()),
        stripe_subscription_id: Some("sub_123".to_string()),
        metadata: LicenseMetadata {
            origin_event_id: Some("cs_test_1".to_string()),
            created_via: "test".to_string(),
            ..Default::default()
        },
    }
}

/// Memory store that counts calls and can be told to fail side-effect writes.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryLicenseStore,
    pub lookups: AtomicUsize,
    pub counter_updates: AtomicUsize,
    pub log_appends: AtomicUsize,
    pub fail_lookup: AtomicBool,
    pub fail_counter_update: AtomicBool,
    pub fail_log_append: AtomicBool,
    /// Keys whose insert reports a conflict, consumed one per insert.
    pub conflicts_remaining: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_record(record: LicenseRecord) -> Self {
        let store = Self::new();
        store.inner.put_raw(record).await;
        store
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn log_appends(&self) -> usize {
        self.log_appends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LicenseStore for CountingStore {
    fn backend_name(&self) -> &'static str {
        "counting"
    }

    async fn insert_license(&self, record: &LicenseRecord) -> StoreResult<LicenseRecord> {
        let remaining = self.conflicts_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict(record.license_key.to_string()));
        }
        self.inner.insert_license(record).await
    }

    async fn get_license(&self, license_key: &str) -> StoreResult<Option<LicenseRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        self.inner.get_license(license_key).await
    }

    async fn get_license_by_subscription(
        &self,
        subscription_id: &str,
    ) -> StoreResult<Option<LicenseRecord>> {
        self.inner.get_license_by_subscription(subscription_id).await
    }

    async fn update_license_status(
        &self,
        license_key: &str,
        status: LicenseStatus,
    ) -> StoreResult<LicenseRecord> {
        self.inner.update_license_status(license_key, status).await
    }

    async fn update_validation_metadata(
        &self,
        license_key: &str,
        validation_count: u64,
    ) -> StoreResult<LicenseRecord> {
        self.counter_updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_counter_update.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("update timed out".to_string()));
        }
        self.inner
            .update_validation_metadata(license_key, validation_count)
            .await
    }

    async fn append_validation_log(&self, entry: &ValidationLogEntry) -> StoreResult<()> {
        self.log_appends.fetch_add(1, Ordering::SeqCst);
        if self.fail_log_append.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("audit table unavailable".to_string()));
        }
        self.inner.append_validation_log(entry).await
    }
}

/// Notifier that records sends and can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String, Tier)>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn sent(&self) -> Vec<(String, String, Tier)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn provider_name(&self) -> &'static str {
        "recording"
    }

    async fn send_activation_email(
        &self,
        email: &str,
        license_key: &LicenseKey,
        tier: Tier,
    ) -> NotifyResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("smtp relay down".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), license_key.to_string(), tier));
        Ok(())
    }
}
