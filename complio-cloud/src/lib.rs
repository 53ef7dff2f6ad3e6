//! Hosted backends for Complio licensing.
//!
//! - [`RestLicenseStore`]: license records and the validation log in a
//!   PostgREST-fronted Postgres database (Supabase).
//! - [`ResendNotifier`]: activation emails through the Resend HTTP API.

mod error;
mod resend;
mod rest_store;

pub use error::{CloudError, CloudResult};
pub use resend::{ResendConfig, ResendNotifier};
pub use rest_store::{RestLicenseStore, RestStoreConfig};
