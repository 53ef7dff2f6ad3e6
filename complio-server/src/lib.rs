//! HTTP API for Complio licensing.
//!
//! Two endpoints:
//! - `POST /api/validate_license`: public validation, CORS-enabled.
//! - `POST /api/generate_license`: billing webhook that issues licenses.

mod error;

pub use error::ApiError;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, header};
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use complio_license::{
    BillingEvent, ClientInfo, LicenseIssuer, LicenseStore, LicenseValidator, Notifier,
    SIGNATURE_HEADER, Tier, ValidationResponse, verify_webhook,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

pub const VALIDATE_PATH: &str = "/api/validate_license";
pub const WEBHOOK_PATH: &str = "/api/generate_license";

/// Secrets read at startup. Any of them may be absent; requests that need
/// a missing one fail with a configuration error.
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Hex-encoded license signing secret.
    pub signing_key: Option<String>,
    /// Billing webhook secret.
    pub webhook_secret: Option<String>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ServerConfig")
            .field("signing_key", &redact(&self.signing_key))
            .field("webhook_secret", &redact(&self.webhook_secret))
            .finish()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LicenseStore>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LicenseStore>,
        notifier: Arc<dyn Notifier>,
        config: ServerConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config: Arc::new(config),
        }
    }
}

/// Body of a webhook response.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WebhookResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Extracts the caller's address and user agent for the audit log.
///
/// The address is the first `X-Forwarded-For` hop, as set by the proxy
/// in front of the service.
pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    ClientInfo {
        ip_address: header_text(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        user_agent: header_text(headers, "user-agent").map(str::to_string),
    }
}

async fn validate_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ValidationResponse>, ApiError> {
    let signing_key = state
        .config
        .signing_key
        .as_deref()
        .ok_or(ApiError::Configuration)?;

    let request: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("Invalid JSON in request body"))?;
    let license_key = request
        .get("license_key")
        .and_then(serde_json::Value::as_str)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing license_key in request"))?;

    let validator = LicenseValidator::new(state.store.clone(), signing_key);
    let verdict = validator.validate(license_key, &client_info(&headers)).await?;
    Ok(Json(verdict.into()))
}

async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let (Some(webhook_secret), Some(signing_key)) = (
        state.config.webhook_secret.as_deref(),
        state.config.signing_key.as_deref(),
    ) else {
        return Err(ApiError::Configuration);
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing Stripe signature"))?;
    verify_webhook(&body, signature, webhook_secret, Utc::now())?;

    let event = BillingEvent::parse(&body)?;
    let Some(session) = event.checkout_session()? else {
        debug!(event_id = %event.id, event_type = %event.event_type, "ignoring billing event");
        return Ok(Json(WebhookResponse {
            message: format!("Event type {} received but not processed", event.event_type),
            license_key: None,
            email: None,
            tier: None,
        }));
    };

    let request = session.into_issue_request()?;
    let issuer = LicenseIssuer::new(state.store.clone(), state.notifier.clone(), signing_key)?;
    let issued = issuer.issue(request).await?;
    info!(
        event_id = %event.id,
        license_key = %issued.record.license_key,
        email_sent = issued.email_sent,
        "checkout fulfilled"
    );

    Ok(Json(WebhookResponse {
        message: "License generated successfully".to_string(),
        license_key: Some(issued.record.license_key.to_string()),
        email: Some(issued.record.email),
        tier: Some(issued.record.tier),
    }))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the HTTP API router with the given state.
pub fn build_router(state: AppState) -> Router {
    let validation = Router::new()
        .route(VALIDATE_PATH, post(validate_license))
        .layer(cors_layer());

    Router::new()
        .route(WEBHOOK_PATH, post(billing_webhook))
        .merge(validation)
        .with_state(state)
}
