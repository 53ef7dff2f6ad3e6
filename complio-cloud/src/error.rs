//! Hosted backend error types.

use complio_license::{NotifyError, StoreError};
use reqwest::Response;
use reqwest::header::RETRY_AFTER;
use thiserror::Error;

/// Result type for hosted backend operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur talking to a hosted backend.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Passes a successful response through, turning any other status into an error.
pub(crate) async fn check_status(response: Response, context: &str) -> CloudResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(1);
    let body = response.text().await.unwrap_or_default();

    Err(match status.as_u16() {
        401 | 403 => CloudError::AuthFailed(format!("{context}: {body}")),
        404 => CloudError::NotFound(format!("{context}: {body}")),
        409 => CloudError::Conflict(format!("{context}: {body}")),
        429 => CloudError::RateLimited { retry_after_secs },
        _ => CloudError::Api(format!("{context}: HTTP {status}: {body}")),
    })
}

impl From<CloudError> for StoreError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::NotFound(msg) => StoreError::NotFound(msg),
            CloudError::Conflict(msg) => StoreError::Conflict(msg),
            CloudError::Serialization(e) => StoreError::Serialization(e.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<CloudError> for NotifyError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::Config(msg) => NotifyError::NotConfigured(msg),
            other => NotifyError::Delivery(other.to_string()),
        }
    }
}
