//! License issuance and validation for Complio.
//!
//! This crate handles:
//! - License key generation (`COMPL-XXXX-XXXX-XXXX-XXXX`, 64 random bits)
//! - HMAC-SHA256 signatures binding key, owner email and tier
//! - Validation of presented keys against a stored record
//! - Issuance from verified billing webhooks
//!
//! # Design Principles
//!
//! - **Stateless core**: all state lives behind [`LicenseStore`]
//! - **Injected collaborators**: stores and notifiers are passed in, never global
//! - **Verdicts are not errors**: an invalid key is an `Ok` [`Verdict`]
//! - **Side effects never flip a verdict**: audit, counter and email writes are best-effort

mod billing;
mod error;
mod issuance;
mod key;
mod memory;
mod notify;
mod record;
mod side_effect;
mod signing;
mod store;
mod validation;

pub use billing::{
    BillingEvent, CHECKOUT_COMPLETED, CREATED_VIA_WEBHOOK, CheckoutSession, EventData,
    SIGNATURE_HEADER, SIGNATURE_TOLERANCE_SECS, compute_webhook_signature, signature_header,
    verify_webhook,
};
pub use error::{
    LicenseError, LicenseResult, NotifyError, NotifyResult, StoreError, StoreResult,
};
pub use issuance::{DEFAULT_TERM_DAYS, IssueRequest, IssuedLicense, LicenseIssuer, MAX_KEY_ATTEMPTS};
pub use key::{KEY_LEN, KEY_PAYLOAD_BYTES, KEY_PREFIX, LicenseKey, is_well_formed};
pub use memory::MemoryLicenseStore;
pub use notify::{DisabledNotifier, Notifier, activation_body, activation_subject};
pub use record::{
    ClientInfo, LicenseMetadata, LicenseRecord, LicenseStatus, RESERVED_METADATA_KEYS, Tier,
    ValidationLogEntry, parse_timestamp,
};
pub use side_effect::{Effect, SideEffect, best_effort};
pub use signing::{SIGNATURE_HEX_LEN, SigningSecret, sign, signing_message, verify};
pub use store::LicenseStore;
pub use validation::{LicenseValidator, Rejection, ValidationResponse, Verdict};
