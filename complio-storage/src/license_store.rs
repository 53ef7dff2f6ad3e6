//! [`LicenseStore`] implementation over a shared SQLite connection.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use complio_license::{
    LicenseKey, LicenseRecord, LicenseStatus, LicenseStore, StoreResult, Tier, ValidationLogEntry,
    parse_timestamp,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

const LICENSE_COLUMNS: &str = "license_key, email, tier, status, signature, expires_at, \
     validation_count, last_validated_at, stripe_customer_id, stripe_subscription_id, metadata";

/// Persistent license store backed by SQLite.
#[derive(Clone)]
pub struct SqliteLicenseStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLicenseStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening license database");
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn init_schema(&self) -> StorageResult<()> {
        self.conn()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS licenses (
                license_key TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                tier TEXT NOT NULL,
                status TEXT NOT NULL,
                signature TEXT NOT NULL,
                expires_at TEXT,
                validation_count INTEGER NOT NULL DEFAULT 0,
                last_validated_at TEXT,
                stripe_customer_id TEXT,
                stripe_subscription_id TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_licenses_subscription
                ON licenses (stripe_subscription_id);

            CREATE TABLE IF NOT EXISTS validations (
                id TEXT PRIMARY KEY,
                license_key TEXT NOT NULL,
                validated_at TEXT NOT NULL,
                success INTEGER NOT NULL,
                ip_address TEXT,
                user_agent TEXT,
                error_message TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_validations_license
                ON validations (license_key, validated_at);
            ",
        )?;
        Ok(())
    }

    // ── Licenses ─────────────────────────────────────────────────

    /// Inserts a new license row.
    ///
    /// Fails with [`StorageError::Duplicate`] if the key is already taken.
    pub fn insert(&self, record: &LicenseRecord) -> StorageResult<()> {
        let metadata = serde_json::to_string(&record.metadata)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO licenses (license_key, email, tier, status, signature, expires_at,
                validation_count, last_validated_at, stripe_customer_id, stripe_subscription_id,
                metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.license_key.as_str(),
                record.email,
                record.tier.as_str(),
                record.status.as_str(),
                record.signature,
                record.expires_at,
                i64::try_from(record.validation_count).unwrap_or(i64::MAX),
                record.last_validated_at.map(format_timestamp),
                record.stripe_customer_id,
                record.stripe_subscription_id,
                metadata,
                format_timestamp(Utc::now()),
            ],
        )
        .map_err(|e| {
            let err = StorageError::from(e);
            if err.is_constraint_violation() {
                StorageError::Duplicate(record.license_key.to_string())
            } else {
                err
            }
        })?;
        Ok(())
    }

    /// Looks up a license by key.
    pub fn get(&self, license_key: &str) -> StorageResult<Option<LicenseRecord>> {
        let conn = self.conn()?;
        fetch_license(&conn, license_key)
    }

    /// Returns the most recent license issued for a billing subscription.
    pub fn get_by_subscription(&self, subscription_id: &str) -> StorageResult<Option<LicenseRecord>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {LICENSE_COLUMNS} FROM licenses
                     WHERE stripe_subscription_id = ?1
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![subscription_id],
                RawLicense::from_row,
            )
            .optional()?;
        raw.map(RawLicense::into_record).transpose()
    }

    /// Sets the status of a license and stamps `last_validated_at`.
    pub fn set_status(&self, license_key: &str, status: LicenseStatus) -> StorageResult<LicenseRecord> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE licenses SET status = ?2, last_validated_at = ?3 WHERE license_key = ?1",
            params![license_key, status.as_str(), format_timestamp(Utc::now())],
        )?;
        require_row(&conn, license_key, changed)
    }

    /// Overwrites the validation counter and stamps `last_validated_at`.
    pub fn record_validation(&self, license_key: &str, count: u64) -> StorageResult<LicenseRecord> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE licenses SET validation_count = ?2, last_validated_at = ?3
             WHERE license_key = ?1",
            params![
                license_key,
                i64::try_from(count).unwrap_or(i64::MAX),
                format_timestamp(Utc::now()),
            ],
        )?;
        require_row(&conn, license_key, changed)
    }

    /// Returns the number of stored licenses.
    pub fn license_count(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM licenses", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ── Validation log ───────────────────────────────────────────

    /// Appends one audit row.
    pub fn append_validation(&self, entry: &ValidationLogEntry) -> StorageResult<()> {
        self.conn()?.execute(
            "INSERT INTO validations (id, license_key, validated_at, success, ip_address,
                user_agent, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id.to_string(),
                entry.license_key,
                format_timestamp(entry.validated_at),
                entry.success,
                entry.ip_address,
                entry.user_agent,
                entry.error_message,
            ],
        )?;
        Ok(())
    }

    /// Loads the audit rows for a presented key, oldest first.
    pub fn validations_for(&self, license_key: &str) -> StorageResult<Vec<ValidationLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, license_key, validated_at, success, ip_address, user_agent, error_message
             FROM validations WHERE license_key = ?1 ORDER BY validated_at, rowid",
        )?;
        let rows = stmt.query_map(params![license_key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (id, license_key, validated_at, success, ip_address, user_agent, error_message) =
                row?;
            result.push(ValidationLogEntry {
                id: Uuid::parse_str(&id)
                    .map_err(|e| StorageError::InvalidData(format!("invalid validation id: {e}")))?,
                license_key,
                validated_at: parse_stored_timestamp(&validated_at)?,
                success,
                ip_address,
                user_agent,
                error_message,
            });
        }
        Ok(result)
    }
}

fn fetch_license(conn: &Connection, license_key: &str) -> StorageResult<Option<LicenseRecord>> {
    let raw = conn
        .query_row(
            &format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE license_key = ?1"),
            params![license_key],
            RawLicense::from_row,
        )
        .optional()?;
    raw.map(RawLicense::into_record).transpose()
}

fn require_row(conn: &Connection, license_key: &str, changed: usize) -> StorageResult<LicenseRecord> {
    if changed == 0 {
        return Err(StorageError::NotFound(license_key.to_string()));
    }
    fetch_license(conn, license_key)?.ok_or_else(|| StorageError::NotFound(license_key.to_string()))
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_stored_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("invalid timestamp {raw:?}: {e}")))
}

/// Column values as read, before label and JSON decoding.
struct RawLicense {
    license_key: String,
    email: String,
    tier: String,
    status: String,
    signature: String,
    expires_at: Option<String>,
    validation_count: i64,
    last_validated_at: Option<String>,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    metadata: String,
}

impl RawLicense {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            license_key: row.get(0)?,
            email: row.get(1)?,
            tier: row.get(2)?,
            status: row.get(3)?,
            signature: row.get(4)?,
            expires_at: row.get(5)?,
            validation_count: row.get(6)?,
            last_validated_at: row.get(7)?,
            stripe_customer_id: row.get(8)?,
            stripe_subscription_id: row.get(9)?,
            metadata: row.get(10)?,
        })
    }

    fn into_record(self) -> StorageResult<LicenseRecord> {
        let invalid = |e: complio_license::LicenseError| StorageError::InvalidData(e.to_string());
        Ok(LicenseRecord {
            license_key: LicenseKey::parse(&self.license_key).map_err(invalid)?,
            email: self.email,
            tier: Tier::from_label(&self.tier).map_err(invalid)?,
            status: self.status.parse().map_err(invalid)?,
            signature: self.signature,
            expires_at: self.expires_at,
            validation_count: u64::try_from(self.validation_count).unwrap_or(0),
            last_validated_at: self
                .last_validated_at
                .as_deref()
                .map(|raw| {
                    parse_timestamp(raw).map_err(|e| {
                        StorageError::InvalidData(format!("invalid timestamp {raw:?}: {e}"))
                    })
                })
                .transpose()?,
            stripe_customer_id: self.stripe_customer_id,
            stripe_subscription_id: self.stripe_subscription_id,
            metadata: serde_json::from_str(&self.metadata)?,
        })
    }
}

#[async_trait]
impl LicenseStore for SqliteLicenseStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert_license(&self, record: &LicenseRecord) -> StoreResult<LicenseRecord> {
        self.insert(record)?;
        Ok(record.clone())
    }

    async fn get_license(&self, license_key: &str) -> StoreResult<Option<LicenseRecord>> {
        Ok(self.get(license_key)?)
    }

    async fn get_license_by_subscription(
        &self,
        subscription_id: &str,
    ) -> StoreResult<Option<LicenseRecord>> {
        Ok(self.get_by_subscription(subscription_id)?)
    }

    async fn update_license_status(
        &self,
        license_key: &str,
        status: LicenseStatus,
    ) -> StoreResult<LicenseRecord> {
        Ok(self.set_status(license_key, status)?)
    }

    async fn update_validation_metadata(
        &self,
        license_key: &str,
        validation_count: u64,
    ) -> StoreResult<LicenseRecord> {
        Ok(self.record_validation(license_key, validation_count)?)
    }

    async fn append_validation_log(&self, entry: &ValidationLogEntry) -> StoreResult<()> {
        Ok(self.append_validation(entry)?)
    }
}
