// ============================================================================
// src/util/atomic.rs – Durable, permissioned atomic replacement of store files
// ============================================================================

use anyhow::{bail, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Mode for every file the stores write: owner read/write only.
pub const STORE_FILE_MODE: u32 = 0o600;

fn parent_dir(path: &Path) -> Result<PathBuf> {
    path.parent()
        .map(|p| p.to_path_buf())
        .context("Target path has no parent directory")
}

/// Fsync a directory to persist the rename.
fn fsync_dir(dir: &Path) -> Result<()> {
    let f = File::open(dir).with_context(|| format!("Open dir for fsync: {dir:?}"))?;
    f.sync_all()
        .with_context(|| format!("Fsync dir failed: {dir:?}"))?;
    Ok(())
}

fn reject_symlink_target(path: &Path) -> Result<()> {
    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.file_type().is_symlink() {
            bail!("Refusing to write to symlink: {}", path.display());
        }
    }
    Ok(())
}

/// Replace `path` with `bytes`: temp file in the same directory, fsync,
/// rename over the target, fsync the directory. Readers see either the old
/// contents or the new ones, never a torn write.
pub fn atomic_replace(path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
    reject_symlink_target(path)?;

    let dir = parent_dir(path)?;
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Create parent directory failed: {dir:?}"))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Target path missing file name")?;

    let mut tmp = path.to_path_buf();
    for _ in 0..8 {
        tmp.set_file_name(format!("{}.tmp-{}", file_name, nanoid::nanoid!(8)));
        if !tmp.exists() {
            break;
        }
    }

    let mut f = OpenOptions::new()
        .create_new(true)
        .write(true)
        .mode(mode)
        .open(&tmp)
        .with_context(|| format!("Open temp file failed: {tmp:?}"))?;

    let written = f
        .write_all(bytes)
        .context("Write to temp file failed")
        .and_then(|_| f.sync_all().context("Fsync temp file failed"));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| {
            format!(
                "Atomic rename failed ({} -> {})",
                tmp.display(),
                path.display()
            )
        });
    }

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("Set permissions failed for {}", path.display()))?;

    if !dir.as_os_str().is_empty() {
        fsync_dir(&dir)?;
    }

    Ok(())
}

/// Atomic write of a TOML-serializable value with 0600 permissions.
pub fn atomic_write_toml<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = toml::to_string_pretty(value).context("Serialize TOML failed")?;
    atomic_replace(path, s.as_bytes(), STORE_FILE_MODE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn replace_overwrites_and_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");

        atomic_replace(&path, b"one", STORE_FILE_MODE).unwrap();
        atomic_replace(&path, b"two", STORE_FILE_MODE).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"two");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "temp files must not linger");
    }

    #[test]
    fn symlink_targets_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        let link = dir.path().join("link");
        fs::write(&real, b"x").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(atomic_replace(&link, b"y", STORE_FILE_MODE).is_err());
        assert_eq!(fs::read(&real).unwrap(), b"x");
    }

    #[test]
    fn toml_values_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("map.toml");
        let mut map = BTreeMap::new();
        map.insert("bob".to_string(), 3u32);

        atomic_write_toml(&path, &map).unwrap();
        let back: BTreeMap<String, u32> =
            toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, map);
    }
}
