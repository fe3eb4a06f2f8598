// ============================================================================
// src/error.rs – Store and authentication error taxonomy
// ============================================================================

use std::time::Duration;
use thiserror::Error;

/// Failures raised by credential and security-state stores.
///
/// Every variant is treated the same way by the authentication path: the
/// attempt is denied. Callers never see which backend fault occurred.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store access timed out after {0:?}")]
    Timeout(Duration),

    #[error("store data corrupt: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Internal reason an authentication attempt was denied.
///
/// Only visible to tracing output and tests. `Authenticator::authenticate`
/// collapses all of these into a plain `None`.
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("injection detected ({reason}, score {score})")]
    InjectionDetected { reason: String, score: u8 },

    #[error("account locked for another {seconds_remaining}s")]
    AccountLocked { seconds_remaining: i64 },

    #[error("credential mismatch")]
    CredentialMismatch,

    #[error("backing store failure: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl AuthFailure {
    /// Stable short label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InjectionDetected { .. } => "injection_detected",
            Self::AccountLocked { .. } => "account_locked",
            Self::CredentialMismatch => "credential_mismatch",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
