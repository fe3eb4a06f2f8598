// ============================================================================
// src/store/memory.rs – Process-local stores
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use super::{CredentialStore, SecurityStateStore, Transition};
use crate::error::StoreResult;
use crate::model::{Credential, SecurityRecord};
use crate::util::deadline::{lock_by, Deadline};

#[derive(Debug, Default)]
pub struct MemorySecurityStore {
    records: Mutex<HashMap<String, SecurityRecord>>,
}

impl MemorySecurityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecurityStateStore for MemorySecurityStore {
    fn get(&self, identity: &str, deadline: Deadline) -> StoreResult<Option<SecurityRecord>> {
        let records = lock_by(&self.records, deadline)?;
        Ok(records.get(identity).cloned())
    }

    fn upsert(&self, record: SecurityRecord, deadline: Deadline) -> StoreResult<()> {
        let mut records = lock_by(&self.records, deadline)?;
        records.insert(record.identity.clone(), record);
        Ok(())
    }

    fn update(
        &self,
        identity: &str,
        transition: &mut Transition<'_>,
        deadline: Deadline,
    ) -> StoreResult<Option<SecurityRecord>> {
        let mut records = lock_by(&self.records, deadline)?;
        let next = transition(records.get(identity));
        match next {
            Some(next) => {
                deadline.check()?;
                records.insert(identity.to_string(), next.clone());
                Ok(Some(next))
            }
            None => Ok(records.get(identity).cloned()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: Mutex<Vec<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new(users: Vec<Credential>) -> Self {
        Self {
            users: Mutex::new(users),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn find_by_identity(
        &self,
        identity: &str,
        deadline: Deadline,
    ) -> StoreResult<Option<Credential>> {
        let users = lock_by(&self.users, deadline)?;
        Ok(users.iter().find(|u| u.identity == identity).cloned())
    }

    fn find_by_id(&self, id: u64, deadline: Deadline) -> StoreResult<Option<Credential>> {
        let users = lock_by(&self.users, deadline)?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }
}
