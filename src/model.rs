// ============================================================================
// src/model.rs – Persisted records shared by the stores and the engine
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an identity was last locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockoutReason {
    /// Escalating lock driven by the consecutive failure count.
    Progressive,
    /// Fixed lock forced by a malicious scorer verdict. Durable: only an
    /// administrative override clears it.
    Injection,
}

/// Per-identity lockout state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRecord {
    pub identity: String,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockout_reason: Option<LockoutReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockout_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl SecurityRecord {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            consecutive_failures: 0,
            locked_until: None,
            lockout_reason: None,
            lockout_detail: None,
            last_failure_at: None,
        }
    }

    /// Locked iff the stored deadline lies in the future. Expired deadlines
    /// are ignored without being cleared.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    pub fn seconds_remaining_at(&self, now: DateTime<Utc>) -> i64 {
        match self.locked_until {
            Some(until) if now < until => (until - now).num_seconds(),
            _ => 0,
        }
    }

    pub fn is_injection_flagged(&self) -> bool {
        self.lockout_reason == Some(LockoutReason::Injection)
    }
}

/// Account row owned by the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: u64,
    pub identity: String,
    pub display_name: String,
    #[serde(default)]
    pub contact: String,
    /// Lower-case hex SHA-256 of the secret.
    pub secret_digest: String,
}

impl Credential {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            identity: self.identity.clone(),
            display_name: self.display_name.clone(),
            contact: self.contact.clone(),
        }
    }
}

/// What a successful login hands back. Never includes the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub id: u64,
    pub identity: String,
    pub display_name: String,
    pub contact: String,
}
