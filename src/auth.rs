// ============================================================================
// src/auth.rs – Authentication gate: scorer → lockout → credential check
// ============================================================================

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::AuthFailure;
use crate::lockout::{LockoutEngine, LockoutInfo};
use crate::model::PublicUser;
use crate::scoring::{score, ScoreResult};
use crate::store::CredentialStore;
use crate::util::audit::{AuditRecord, AuditSink, Decision};
use crate::util::deadline::Deadline;
use crate::util::digest::{digests_match, secret_digest};

const FALLBACK_PATTERN: &str = "Suspicious pattern";

pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
    lockout: LockoutEngine,
    audit: Arc<dyn AuditSink>,
}

impl Authenticator {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        lockout: LockoutEngine,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            credentials,
            lockout,
            audit,
        }
    }

    pub fn lockout(&self) -> &LockoutEngine {
        &self.lockout
    }

    /// Authenticate `identity` with `secret`.
    ///
    /// Every denial looks the same to the caller. The reason is only
    /// recorded in logs, the audit trail and [`Self::lockout_info`].
    pub fn authenticate(&self, identity: &str, secret: &str) -> Option<PublicUser> {
        self.authenticate_within(identity, secret, self.lockout.deadline())
    }

    /// As [`Self::authenticate`], with every store access bounded by
    /// `deadline`. An expired deadline denies.
    pub fn authenticate_within(
        &self,
        identity: &str,
        secret: &str,
        deadline: Deadline,
    ) -> Option<PublicUser> {
        match self.evaluate(identity, secret, deadline) {
            Ok(user) => {
                info!(identity, user_id = user.id, "authentication succeeded");
                Some(user)
            }
            Err(failure) => {
                match &failure {
                    AuthFailure::StoreUnavailable(e) => {
                        error!(identity, error = %e, "authentication denied: store failure")
                    }
                    other => {
                        warn!(identity, kind = other.kind(), "authentication denied: {other}")
                    }
                }
                None
            }
        }
    }

    /// Byte-level entry point for callers that have not decoded their input.
    /// Anything that is not UTF-8 is rejected as invalid input.
    pub fn authenticate_bytes(&self, identity: &[u8], secret: &[u8]) -> Option<PublicUser> {
        match (std::str::from_utf8(identity), std::str::from_utf8(secret)) {
            (Ok(identity), Ok(secret)) => self.authenticate(identity, secret),
            _ => {
                warn!(
                    kind = "invalid_input",
                    "authentication denied: credentials are not valid UTF-8"
                );
                None
            }
        }
    }

    pub fn is_locked(&self, identity: &str) -> bool {
        // Unknown state reads as locked.
        self.lockout.is_locked(identity).unwrap_or_else(|e| {
            error!(identity, error = %e, "lock state unavailable");
            true
        })
    }

    pub fn lockout_info(&self, identity: &str) -> Option<LockoutInfo> {
        self.lockout
            .lockout_info(identity)
            .map_err(|e| error!(identity, error = %e, "lock state unavailable"))
            .ok()
    }

    /// Public profile by numeric id.
    pub fn lookup_user(&self, id: u64) -> Option<PublicUser> {
        match self.credentials.find_by_id(id, self.lockout.deadline()) {
            Ok(found) => found.map(|c| c.public()),
            Err(e) => {
                error!(id, error = %e, "credential lookup failed");
                None
            }
        }
    }

    /// Score an arbitrary input and audit the decision. When `lock_identity`
    /// is given and the input is malicious, that identity is locked too.
    /// Returns the verdict and whether a lock was applied.
    pub fn screen(
        &self,
        input: &str,
        lock_identity: Option<&str>,
    ) -> (ScoreResult, Result<bool, AuthFailure>) {
        let verdict = score(input);
        self.audit_decision(&verdict, &format!("Query: {input}"));

        let applied = match lock_identity.filter(|_| verdict.is_malicious) {
            Some(identity) if !identity.is_empty() => self
                .lockout
                .force_injection_lock(identity, verdict.primary_reason.unwrap_or(FALLBACK_PATTERN))
                .map(|_| true)
                .map_err(AuthFailure::from),
            _ => Ok(false),
        };
        (verdict, applied)
    }

    pub(crate) fn evaluate(
        &self,
        identity: &str,
        secret: &str,
        deadline: Deadline,
    ) -> Result<PublicUser, AuthFailure> {
        if identity.is_empty() || secret.is_empty() {
            return Err(AuthFailure::InvalidInput("empty identity or secret"));
        }

        let identity_verdict = score(identity);
        let secret_verdict = score(secret);
        let malicious = [&identity_verdict, &secret_verdict]
            .into_iter()
            .find(|v| v.is_malicious);

        let combined_score = identity_verdict.score.max(secret_verdict.score);
        let decision = AuditRecord::new(
            if malicious.is_some() {
                Decision::Block
            } else {
                Decision::Allow
            },
            combined_score,
            format!("Auth Identity: {identity}"),
        );

        if let Some(verdict) = malicious {
            let reason = verdict.primary_reason.unwrap_or(FALLBACK_PATTERN);
            // Blocks are written before the deny goes out.
            self.append_audit(&decision);
            self.lockout.force_injection_lock_by(identity, reason, deadline)?;
            return Err(AuthFailure::InjectionDetected {
                reason: reason.to_string(),
                score: verdict.score,
            });
        }
        self.append_audit(&decision);

        let info = self.lockout.lockout_info_by(identity, deadline)?;
        if info.locked {
            return Err(AuthFailure::AccountLocked {
                seconds_remaining: info.seconds_remaining,
            });
        }

        let computed = secret_digest(secret);
        let matched = self
            .credentials
            .find_by_identity(identity, deadline)?
            .filter(|c| digests_match(&computed, &c.secret_digest));

        match matched {
            Some(credential) => {
                self.lockout.record_success_by(identity, deadline)?;
                Ok(credential.public())
            }
            None => {
                self.lockout.record_failure_by(identity, deadline)?;
                Err(AuthFailure::CredentialMismatch)
            }
        }
    }

    fn audit_decision(&self, verdict: &ScoreResult, subject: &str) {
        let decision = if verdict.is_malicious {
            Decision::Block
        } else {
            Decision::Allow
        };
        self.append_audit(&AuditRecord::new(decision, verdict.score, subject));
    }

    fn append_audit(&self, record: &AuditRecord) {
        match self.audit.append(record) {
            Ok(()) => debug!(decision = ?record.decision, score = record.score, "audit record appended"),
            Err(e) => warn!(error = %e, "audit sink rejected record; decision unaffected"),
        }
    }
}
