// ============================================================================
// src/util/flock.rs – Cross-process exclusive locks on sidecar lock files
// ============================================================================

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::util::atomic::STORE_FILE_MODE;
use crate::util::deadline::Deadline;

/// Sidecar lock path for a store file: `<path>.lock`.
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Try to take an exclusive flock without blocking.
///
/// `Ok(false)` means another open file description holds it.
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    // SAFETY: `file` owns a valid descriptor for the duration of the call.
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}

/// Exclusive `flock(LOCK_EX)` on a lock file, released on drop.
///
/// Every acquisition opens the file afresh, so two handles in the same
/// process exclude each other exactly like two processes do.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    pub fn acquire(path: &Path, deadline: Deadline) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .mode(STORE_FILE_MODE)
            .custom_flags(libc::O_NOFOLLOW | libc::O_CLOEXEC)
            .open(path)
            .map_err(|e| StoreError::Unavailable(format!("open lock {}: {e}", path.display())))?;

        deadline.poll(|| match try_flock_exclusive(&file) {
            Ok(true) => Ok(Some(())),
            Ok(false) => Ok(None),
            Err(e) => Err(StoreError::Unavailable(format!(
                "flock {}: {e}",
                path.display()
            ))),
        })?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // SAFETY: `self.file` is still open here.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
