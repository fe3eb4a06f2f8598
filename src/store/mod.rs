// ============================================================================
// src/store/mod.rs – Credential and security-state store interfaces
// ============================================================================
//! Collaborator seams for the authentication core.
//!
//! Lookups are exact-match by key. No implementation ever builds a query
//! string out of caller input. Every access takes the caller's [`Deadline`]
//! and fails with `StoreError::Timeout` once it passes.

pub mod file;
pub mod memory;

use crate::error::StoreResult;
use crate::model::{Credential, SecurityRecord};
use crate::util::deadline::Deadline;

pub use file::{FileCredentialStore, FileSecurityStore};
pub use memory::{MemoryCredentialStore, MemorySecurityStore};

/// Read-only view of account rows.
pub trait CredentialStore: Send + Sync {
    fn find_by_identity(&self, identity: &str, deadline: Deadline)
        -> StoreResult<Option<Credential>>;
    fn find_by_id(&self, id: u64, deadline: Deadline) -> StoreResult<Option<Credential>>;
}

/// A state transition handed to [`SecurityStateStore::update`].
///
/// Receives the current record (if any) and returns the record to persist,
/// or `None` to leave storage untouched.
pub type Transition<'a> = dyn FnMut(Option<&SecurityRecord>) -> Option<SecurityRecord> + 'a;

/// Persisted lockout counters, keyed by identity.
pub trait SecurityStateStore: Send + Sync {
    fn get(&self, identity: &str, deadline: Deadline) -> StoreResult<Option<SecurityRecord>>;

    /// Insert or replace the record for `record.identity`.
    fn upsert(&self, record: SecurityRecord, deadline: Deadline) -> StoreResult<()>;

    /// Atomic read-modify-write. The read, the transition and the write run
    /// under one exclusive hold of the store. If the deadline passes before
    /// the write, or persisting fails, nothing is committed. Returns the
    /// record as stored afterwards.
    fn update(
        &self,
        identity: &str,
        transition: &mut Transition<'_>,
        deadline: Deadline,
    ) -> StoreResult<Option<SecurityRecord>>;
}
