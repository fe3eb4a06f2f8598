// ============================================================================
// src/store/file.rs – TOML-backed stores with atomic durable writes
// ============================================================================

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{CredentialStore, SecurityStateStore, Transition};
use crate::error::{StoreError, StoreResult};
use crate::model::{Credential, SecurityRecord};
use crate::util::atomic::atomic_write_toml;
use crate::util::deadline::Deadline;
use crate::util::digest::secret_digest;
use crate::util::flock::{lock_path_for, FileLock};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SecurityStateFile {
    #[serde(default, rename = "record")]
    records: Vec<SecurityRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default, rename = "user")]
    users: Vec<Credential>,
}

fn read_toml<T>(path: &Path) -> StoreResult<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match fs::read_to_string(path) {
        Ok(text) => toml::from_str(&text)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(StoreError::Unavailable(format!(
            "read {}: {e}",
            path.display()
        ))),
    }
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    atomic_write_toml(path, value)
        .with_context(|| format!("persist {}", path.display()))
        .map_err(|e| StoreError::Unavailable(format!("{e:#}")))
}

fn ensure_parent(path: &Path) -> StoreResult<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .map_err(|e| StoreError::Unavailable(format!("create {}: {e}", dir.display()))),
        _ => Ok(()),
    }
}

/// Security records kept in one TOML file.
///
/// Nothing is cached. Every access takes an exclusive `flock` on
/// `<path>.lock`, re-reads the file, and for writes holds that lock through
/// the atomic rename. Any number of handles, in any number of processes,
/// therefore see one serial history of the file.
#[derive(Debug)]
pub struct FileSecurityStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileSecurityStore {
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        ensure_parent(&path)?;
        let lock_path = lock_path_for(&path);
        let file: SecurityStateFile = read_toml(&path)?;
        info!(path = %path.display(), records = file.records.len(), "security state opened");
        Ok(Self { path, lock_path })
    }

    fn load(&self) -> StoreResult<BTreeMap<String, SecurityRecord>> {
        let file: SecurityStateFile = read_toml(&self.path)?;
        Ok(file
            .records
            .into_iter()
            .map(|r| (r.identity.clone(), r))
            .collect())
    }

    fn persist(&self, records: &BTreeMap<String, SecurityRecord>) -> StoreResult<()> {
        let file = SecurityStateFile {
            records: records.values().cloned().collect(),
        };
        write_toml(&self.path, &file)
    }
}

impl SecurityStateStore for FileSecurityStore {
    fn get(&self, identity: &str, deadline: Deadline) -> StoreResult<Option<SecurityRecord>> {
        let _lock = FileLock::acquire(&self.lock_path, deadline)?;
        Ok(self.load()?.remove(identity))
    }

    fn upsert(&self, record: SecurityRecord, deadline: Deadline) -> StoreResult<()> {
        let _lock = FileLock::acquire(&self.lock_path, deadline)?;
        let mut records = self.load()?;
        records.insert(record.identity.clone(), record);
        deadline.check()?;
        self.persist(&records)
    }

    fn update(
        &self,
        identity: &str,
        transition: &mut Transition<'_>,
        deadline: Deadline,
    ) -> StoreResult<Option<SecurityRecord>> {
        let _lock = FileLock::acquire(&self.lock_path, deadline)?;
        let mut records = self.load()?;
        let Some(next) = transition(records.get(identity)) else {
            return Ok(records.remove(identity));
        };

        records.insert(identity.to_string(), next.clone());
        deadline.check()?;
        self.persist(&records)?;
        debug!(identity, "security record committed");
        Ok(Some(next))
    }
}

/// Account rows kept in one TOML file of `[[user]]` tables.
///
/// Re-read on every lookup so edits made by `sqlock enroll` in another
/// process are picked up without a restart. Enrolment holds the sidecar
/// `flock` across its read-modify-write.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileCredentialStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = lock_path_for(&path);
        Self { path, lock_path }
    }

    fn load(&self) -> StoreResult<CredentialFile> {
        read_toml(&self.path)
    }

    /// Add or replace the account for `identity`, storing only the digest of
    /// `secret`. When `id` is `None` the next free id is assigned.
    pub fn enroll(
        &self,
        id: Option<u64>,
        identity: &str,
        display_name: &str,
        contact: &str,
        secret: &str,
        deadline: Deadline,
    ) -> StoreResult<Credential> {
        ensure_parent(&self.path)?;
        let _lock = FileLock::acquire(&self.lock_path, deadline)?;
        let mut file = self.load()?;

        let existing = file.users.iter().find(|u| u.identity == identity);
        let id = match (id, existing) {
            (Some(id), _) => id,
            (None, Some(user)) => user.id,
            (None, None) => file.users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
        };
        if file
            .users
            .iter()
            .any(|u| u.id == id && u.identity != identity)
        {
            return Err(StoreError::Corrupt(format!(
                "id {id} already belongs to another identity"
            )));
        }

        let credential = Credential {
            id,
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            contact: contact.to_string(),
            secret_digest: secret_digest(secret).to_string(),
        };
        file.users.retain(|u| u.identity != identity);
        file.users.push(credential.clone());
        file.users.sort_by_key(|u| u.id);

        deadline.check()?;
        write_toml(&self.path, &file)?;
        info!(identity, id, "credential enrolled");
        Ok(credential)
    }
}

impl CredentialStore for FileCredentialStore {
    // The file is only ever replaced by rename, so a plain read sees one
    // complete version without taking the lock.
    fn find_by_identity(
        &self,
        identity: &str,
        deadline: Deadline,
    ) -> StoreResult<Option<Credential>> {
        deadline.check()?;
        Ok(self
            .load()?
            .users
            .into_iter()
            .find(|u| u.identity == identity))
    }

    fn find_by_id(&self, id: u64, deadline: Deadline) -> StoreResult<Option<Credential>> {
        deadline.check()?;
        Ok(self.load()?.users.into_iter().find(|u| u.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authenticator;
    use crate::lockout::LockoutEngine;
    use crate::model::LockoutReason;
    use crate::util::audit::NullAuditSink;
    use chrono::Utc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn soon() -> Deadline {
        Deadline::after(Duration::from_secs(2))
    }

    fn failures(store: &FileSecurityStore, identity: &str) -> u32 {
        store
            .get(identity, soon())
            .unwrap()
            .map_or(0, |r| r.consecutive_failures)
    }

    #[test]
    fn security_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.toml");

        let store = FileSecurityStore::open(&path).unwrap();
        let mut record = SecurityRecord::new("admin'--");
        record.locked_until = Some(Utc::now() + chrono::Duration::hours(24));
        record.lockout_reason = Some(LockoutReason::Injection);
        record.lockout_detail = Some("SQL injection attempt: SQL Comment".into());
        store.upsert(record.clone(), soon()).unwrap();
        drop(store);

        let reopened = FileSecurityStore::open(&path).unwrap();
        assert_eq!(reopened.get("admin'--", soon()).unwrap(), Some(record));
        assert!(reopened.get("nobody", soon()).unwrap().is_none());
    }

    #[test]
    fn open_creates_missing_state_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("var").join("sqlock").join("security.toml");
        let store = FileSecurityStore::open(&path).unwrap();
        assert!(store.get("bob", soon()).unwrap().is_none());
    }

    #[test]
    fn failed_persist_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.toml");
        FileSecurityStore::open(&real)
            .unwrap()
            .upsert(SecurityRecord::new("bob"), soon())
            .unwrap();

        // Writes refuse to follow a symlink, reads do not.
        let path = dir.path().join("security.toml");
        std::os::unix::fs::symlink(&real, &path).unwrap();
        let store = FileSecurityStore::open(&path).unwrap();

        let err = store
            .update(
                "bob",
                &mut |current| {
                    let mut next = current.cloned()?;
                    next.consecutive_failures = 9;
                    Some(next)
                },
                soon(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(failures(&store, "bob"), 0);
    }

    #[test]
    fn spent_deadline_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.toml");
        let store = FileSecurityStore::open(&path).unwrap();

        let err = store
            .upsert(SecurityRecord::new("bob"), Deadline::after(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
        assert!(!path.exists());
    }

    #[test]
    fn held_lock_turns_into_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.toml");
        let store = FileSecurityStore::open(&path).unwrap();

        let _held = FileLock::acquire(&lock_path_for(&path), soon()).unwrap();
        let err = store
            .get("bob", Deadline::after(Duration::from_millis(30)))
            .unwrap_err();
        assert_eq!(err, StoreError::Timeout(Duration::from_millis(30)));
    }

    #[test]
    fn corrupt_state_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.toml");
        fs::write(&path, "record = [[[").unwrap();
        assert!(matches!(
            FileSecurityStore::open(&path),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn handles_on_one_file_never_erase_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.toml");
        let a = Arc::new(FileSecurityStore::open(&path).unwrap());
        let b = Arc::new(FileSecurityStore::open(&path).unwrap());

        LockoutEngine::new(a.clone())
            .force_injection_lock("admin", "SQL Comment")
            .unwrap();
        LockoutEngine::new(b.clone()).record_failure("bob").unwrap();

        let admin = a.get("admin", soon()).unwrap().unwrap();
        assert_eq!(admin.lockout_reason, Some(LockoutReason::Injection));
        assert_eq!(failures(&a, "bob"), 1);

        // B never saw A's write before it happened, yet reads it now.
        assert!(LockoutEngine::new(b).is_locked("admin").unwrap());
    }

    #[test]
    fn injection_lock_from_one_handle_denies_login_through_another() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("security.toml");
        let users = FileCredentialStore::open(dir.path().join("users.toml"));
        users
            .enroll(None, "admin", "Admin", "admin@test.com", "admin123", soon())
            .unwrap();

        let b = Authenticator::new(
            Arc::new(users),
            LockoutEngine::new(Arc::new(FileSecurityStore::open(&state).unwrap())),
            Arc::new(NullAuditSink),
        );
        LockoutEngine::new(Arc::new(FileSecurityStore::open(&state).unwrap()))
            .force_injection_lock("admin", "SQL Comment")
            .unwrap();

        assert!(b.authenticate("admin", "admin123").is_none());
        assert!(b.lockout_info("admin").unwrap().is_injection_reason);
    }

    #[test]
    fn concurrent_handles_count_every_increment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.toml");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = FileSecurityStore::open(&path).unwrap();
                thread::spawn(move || {
                    for _ in 0..10 {
                        store
                            .update(
                                "bob",
                                &mut |current| {
                                    let mut next = current
                                        .cloned()
                                        .unwrap_or_else(|| SecurityRecord::new("bob"));
                                    next.consecutive_failures += 1;
                                    Some(next)
                                },
                                Deadline::after(Duration::from_secs(10)),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let store = FileSecurityStore::open(&path).unwrap();
        assert_eq!(failures(&store, "bob"), 40);
    }

    #[test]
    fn enroll_assigns_ids_and_stores_digest_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.toml");
        let store = FileCredentialStore::open(&path);

        let admin = store
            .enroll(None, "admin", "Admin", "admin@test.com", "admin123", soon())
            .unwrap();
        let john = store
            .enroll(None, "john_doe", "John", "john@test.com", "secret123", soon())
            .unwrap();
        assert_eq!(admin.id, 1);
        assert_eq!(john.id, 2);

        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("admin123"));
        assert!(text.contains(secret_digest("admin123").as_str()));

        let found = store.find_by_identity("john_doe", soon()).unwrap().unwrap();
        assert_eq!(found, john);
        assert_eq!(store.find_by_id(1, soon()).unwrap().unwrap().identity, "admin");

        // Re-enrolling keeps the id.
        let again = store
            .enroll(None, "admin", "Admin", "root@test.com", "n3w", soon())
            .unwrap();
        assert_eq!(again.id, 1);
        assert!(store.enroll(Some(2), "admin", "A", "", "x", soon()).is_err());
    }
}
