//! Persistence interface consumed by validation and issuance.
//!
//! The core owns no state. Every read and mutation of a license goes
//! through a [`LicenseStore`] handed in by the caller.

use crate::error::StoreResult;
use crate::record::{LicenseRecord, LicenseStatus, ValidationLogEntry};
use async_trait::async_trait;

/// Abstract license store.
///
/// Implementations must reject a second insert with the same key
/// ([`StoreError::Conflict`](crate::StoreError::Conflict)); the key
/// generator does not guarantee uniqueness.
#[async_trait]
pub trait LicenseStore: Send + Sync {
    /// Returns the name of the backend, for logs.
    fn backend_name(&self) -> &'static str;

    /// Persists a freshly issued license.
    async fn insert_license(&self, record: &LicenseRecord) -> StoreResult<LicenseRecord>;

    /// Looks up a license by key.
    async fn get_license(&self, license_key: &str) -> StoreResult<Option<LicenseRecord>>;

    /// Looks up a license by its billing subscription reference.
    async fn get_license_by_subscription(
        &self,
        subscription_id: &str,
    ) -> StoreResult<Option<LicenseRecord>>;

    /// Moves a license to a new status and refreshes its last-validated stamp.
    async fn update_license_status(
        &self,
        license_key: &str,
        status: LicenseStatus,
    ) -> StoreResult<LicenseRecord>;

    /// Writes the validation counter and stamps last-validated with now.
    ///
    /// This is a plain overwrite. Concurrent validations of one key may
    /// race and under-count.
    async fn update_validation_metadata(
        &self,
        license_key: &str,
        validation_count: u64,
    ) -> StoreResult<LicenseRecord>;

    /// Appends one audit row.
    async fn append_validation_log(&self, entry: &ValidationLogEntry) -> StoreResult<()>;
}
