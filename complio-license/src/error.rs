//! Error types for the licensing core.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The presented key does not match the `COMPL-XXXX-XXXX-XXXX-XXXX` shape.
    #[error("invalid license key format: {0}")]
    InvalidKeyFormat(String),

    /// The signing secret is not valid hexadecimal.
    #[error("signing secret is not valid hex: {0}")]
    InvalidSecretEncoding(String),

    /// Tier label outside the known plan set.
    #[error("unknown license tier: {0}")]
    UnknownTier(String),

    /// Status label outside ACTIVE/SUSPENDED/CANCELLED.
    #[error("unknown license status: {0}")]
    UnknownStatus(String),

    /// A required field was absent from an inbound payload.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Billing webhook signature header is missing, malformed or does not match.
    #[error("webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Every generated key collided with an existing license.
    #[error("could not allocate a unique license key after {0} attempts")]
    KeyCollision(u32),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;

/// Errors surfaced by a [`LicenseStore`](crate::LicenseStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with the given key or reference.
    #[error("license not found: {0}")]
    NotFound(String),

    /// Unique constraint violated (duplicate license key).
    #[error("license already exists: {0}")]
    Conflict(String),

    /// Backend failure (database, network, unexpected response).
    #[error("store backend error: {0}")]
    Backend(String),

    /// Stored data could not be decoded.
    #[error("store serialization error: {0}")]
    Serialization(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the activation email collaborator.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// No delivery credentials were configured.
    #[error("notifier not configured: {0}")]
    NotConfigured(String),

    /// The provider rejected or failed the send.
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// Result type for notifier operations.
pub type NotifyResult<T> = Result<T, NotifyError>;
