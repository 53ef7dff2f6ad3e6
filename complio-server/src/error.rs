//! HTTP error responses.
//!
//! Only configuration and input errors travel through [`ApiError`]. An
//! invalid license is a normal 200 response with `valid: false`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use complio_license::LicenseError;
use thiserror::Error;
use tracing::error;

/// A request that could not be processed.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A secret the request needs was not configured.
    #[error("Server configuration error")]
    Configuration,

    /// Malformed body, missing field or failed webhook verification.
    #[error("{0}")]
    BadRequest(String),

    /// The store could not be reached or rejected the operation.
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Configuration | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self {
        match err {
            LicenseError::Store(e) => ApiError::Database(e.to_string()),
            LicenseError::InvalidSecretEncoding(_) => ApiError::Configuration,
            LicenseError::WebhookSignature(msg) => {
                ApiError::BadRequest(format!("Invalid signature: {msg}"))
            }
            LicenseError::MissingField("customer_email") => {
                ApiError::bad_request("Missing customer email in session")
            }
            LicenseError::MissingField(field) => {
                ApiError::BadRequest(format!("Missing {field} in request"))
            }
            LicenseError::UnknownTier(label) => {
                ApiError::BadRequest(format!("Unknown license tier: {label}"))
            }
            LicenseError::Serialization(e) => ApiError::BadRequest(format!("Webhook error: {e}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
