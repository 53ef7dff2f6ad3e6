//! Non-fatal side effects.
//!
//! Audit logging, counter updates and activation emails run after the
//! main decision is made. Their failure is logged and reported, never
//! propagated.

use std::fmt;
use std::future::Future;
use tracing::warn;

/// Which side effect ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    AuditLog,
    ValidationCounter,
    ActivationEmail,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AuditLog => "audit_log",
            Self::ValidationCounter => "validation_counter",
            Self::ActivationEmail => "activation_email",
        })
    }
}

/// Outcome of a side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect<T> {
    Done(T),
    Failed(String),
}

impl<T> SideEffect<T> {
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// Runs `fut`, downgrading any error to a warning.
pub async fn best_effort<T, E, F>(effect: Effect, license_key: &str, fut: F) -> SideEffect<T>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    match fut.await {
        Ok(value) => SideEffect::Done(value),
        Err(e) => {
            warn!(%effect, license_key, error = %e, "side effect failed, continuing");
            SideEffect::Failed(e.to_string())
        }
    }
}
