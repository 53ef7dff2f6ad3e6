//! SQLite storage layer for Complio licensing.
//!
//! Licenses and the validation audit log live in a single SQLite file,
//! used when no hosted backend is configured. Timestamps are stored as
//! RFC 3339 text; license metadata is stored as a JSON document.

mod error;
mod license_store;

pub use error::{StorageError, StorageResult};
pub use license_store::SqliteLicenseStore;
