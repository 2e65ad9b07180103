//! Atomic mirror writes.
//!
//! ## Write protocol
//!
//! 1. Create the target's parent directories.
//! 2. Write the converted content to `<target>.nbsync.tmp`.
//! 3. Rename over the target (atomic on POSIX); remove the tmp on failure.
//! 4. Copy the source's access and modification times onto the target, so
//!    the pair reads as "same moment" to every later proximity check.

use std::path::{Path, PathBuf};

use filetime::FileTime;

use crate::error::{io_err, SyncError};

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Written { path: PathBuf },
    /// Dry-run: the file would have been written.
    WouldWrite { path: PathBuf },
}

/// Atomically write `content` to `target` and stamp it with `source`'s times.
pub fn write_mirror(
    target: &Path,
    content: &str,
    source: &Path,
    dry_run: bool,
) -> Result<WriteResult, SyncError> {
    let tmp = tmp_path(target);
    write_mirror_with_tmp(target, content, source, dry_run, &tmp)
}

pub(crate) fn tmp_path(target: &Path) -> PathBuf {
    PathBuf::from(format!("{}.nbsync.tmp", target.display()))
}

fn write_mirror_with_tmp(
    target: &Path,
    content: &str,
    source: &Path,
    dry_run: bool,
    tmp: &Path,
) -> Result<WriteResult, SyncError> {
    if dry_run {
        tracing::info!(target = %target.display(), "[dry-run] would write");
        return Ok(WriteResult::WouldWrite {
            path: target.to_path_buf(),
        });
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;
    if let Err(e) = std::fs::rename(tmp, target) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(target, e));
    }

    copy_times(source, target)?;
    tracing::debug!(target = %target.display(), "wrote");
    Ok(WriteResult::Written {
        path: target.to_path_buf(),
    })
}

/// Set `target`'s atime and mtime to `source`'s.
pub fn copy_times(source: &Path, target: &Path) -> Result<(), SyncError> {
    let meta = std::fs::metadata(source).map_err(|e| io_err(source, e))?;
    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_times(target, atime, mtime).map_err(|e| io_err(target, e))
}

/// Remove a mirror file. A file that is already gone counts as removed.
pub fn remove_mirror(path: &Path, dry_run: bool) -> Result<bool, SyncError> {
    if dry_run {
        tracing::info!(path = %path.display(), "[dry-run] would delete");
        return Ok(false);
    }
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(io_err(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn source_with_mtime(dir: &Path, secs: i64) -> PathBuf {
        let source = dir.join("source.md");
        fs::write(&source, "src").unwrap();
        filetime::set_file_mtime(&source, FileTime::from_unix_time(secs, 0)).unwrap();
        source
    }

    #[test]
    fn write_creates_parents_and_copies_mtime() {
        let tmp = TempDir::new().unwrap();
        let source = source_with_mtime(tmp.path(), 1_600_000_000);
        let target = tmp.path().join("deep").join("er").join("out.ipynb");

        let result = write_mirror(&target, "{}", &source, false).unwrap();
        assert_eq!(result, WriteResult::Written { path: target.clone() });
        assert_eq!(fs::read_to_string(&target).unwrap(), "{}");

        let meta = fs::metadata(&target).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&meta),
            FileTime::from_unix_time(1_600_000_000, 0)
        );
        assert!(!tmp_path(&target).exists(), ".nbsync.tmp must be cleaned up");
    }

    #[test]
    fn overwrite_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let source = source_with_mtime(tmp.path(), 1_600_000_000);
        let target = tmp.path().join("out.ipynb");
        fs::write(&target, "old").unwrap();

        write_mirror(&target, "new", &source, false).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn dry_run_does_not_write_file() {
        let tmp = TempDir::new().unwrap();
        let source = source_with_mtime(tmp.path(), 1_600_000_000);
        let target = tmp.path().join("nope.ipynb");
        let result = write_mirror(&target, "content", &source, true).unwrap();
        assert!(matches!(result, WriteResult::WouldWrite { .. }));
        assert!(!target.exists(), "dry-run must not create files");
    }

    #[test]
    fn remove_tolerates_missing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone.md");
        assert!(remove_mirror(&path, false).unwrap());

        fs::write(&path, "x").unwrap();
        assert!(!remove_mirror(&path, true).unwrap());
        assert!(path.exists());
        assert!(remove_mirror(&path, false).unwrap());
        assert!(!path.exists());
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let source = source_with_mtime(root.path(), 1_600_000_000);
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();
        let target = readonly_dir.join("file.ipynb");
        fs::write(&target, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp = tmp_dir.path().join("file.ipynb.nbsync.tmp");
        let result = write_mirror_with_tmp(&target, "new", &source, false, &tmp);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Root ignores directory permissions; only assert when the rename failed.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&target).unwrap(), "original");
            assert!(!tmp.exists(), ".nbsync.tmp should be cleaned up");
        }
    }
}
