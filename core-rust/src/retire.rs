//! Retirement of stale version directories.
//!
//! A version directory is removed in two steps: first its main executable, then,
//! only if that worked, everything else. A running version keeps its executable
//! (Windows refuses the delete, Unix reports the lease as held), so the whole
//! directory stays intact and is retried by the next pass.

use std::{fs, io, path::Path};

use crate::error::Result;
use crate::lease;
use crate::scan::{scan, VersionDirectory};
use crate::version::VersionId;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetireReport {
    /// Fully removed.
    pub removed: Vec<VersionId>,
    /// Left untouched because the version is still in use.
    pub deferred: Vec<VersionId>,
    /// Executable removed but some other file could not be; retried next pass.
    pub incomplete: Vec<VersionId>,
}

enum Outcome {
    Removed,
    Deferred,
    Incomplete,
}

/// Retire every version under `versions_root` except `current`.
///
/// `exe_name` is the file name of the main executable inside each version
/// directory. Directories whose name parses to `current` are never touched.
pub fn retire_old_versions(
    versions_root: &Path,
    current: &VersionId,
    exe_name: &str,
) -> Result<RetireReport> {
    retire_where(versions_root, exe_name, |v| v != current)
}

/// Retire every version under `versions_root`, as the uninstaller does.
pub fn retire_all(versions_root: &Path, exe_name: &str) -> Result<RetireReport> {
    retire_where(versions_root, exe_name, |_| true)
}

fn retire_where(
    versions_root: &Path,
    exe_name: &str,
    is_candidate: impl Fn(&VersionId) -> bool,
) -> Result<RetireReport> {
    let mut report = RetireReport::default();
    for dir in scan(versions_root)? {
        if !is_candidate(&dir.version) {
            continue;
        }
        match retire_one(&dir, exe_name) {
            Outcome::Removed => report.removed.push(dir.version),
            Outcome::Deferred => report.deferred.push(dir.version),
            Outcome::Incomplete => report.incomplete.push(dir.version),
        }
    }
    Ok(report)
}

fn retire_one(dir: &VersionDirectory, exe_name: &str) -> Outcome {
    // Held across both phases so no launch can start in between
    let _idle = match lease::try_lock_idle(&dir.path) {
        Ok(Some(guard)) => guard,
        Ok(None) => {
            tracing::info!("{} is still running, keeping it", dir.path.display());
            return Outcome::Deferred;
        }
        Err(err) => {
            tracing::warn!("cannot lock {}: {err}; keeping it", dir.path.display());
            return Outcome::Deferred;
        }
    };

    let exe = dir.main_executable(exe_name);
    match fs::remove_file(&exe) {
        Ok(()) => {}
        // Already gone: an earlier pass got this far, or the extraction was partial
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::info!("cannot remove {} ({err}), keeping {}", exe.display(), dir.version);
            return Outcome::Deferred;
        }
    }

    match fs::remove_dir_all(&dir.path) {
        Ok(()) => {
            tracing::info!("retired {}", dir.path.display());
            Outcome::Removed
        }
        Err(err) => {
            tracing::warn!("partially removed {}: {err}", dir.path.display());
            Outcome::Incomplete
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_version(root: &Path, name: &str) {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("lib")).unwrap();
        fs::write(dir.join("app.exe"), "exe").unwrap();
        fs::write(dir.join("lib").join("data.txt"), "data").unwrap();
    }

    #[test]
    fn retires_everything_but_current() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for v in ["1.0.0", "1.1.0", "1.2.0"] {
            make_version(root, v);
        }
        fs::write(root.join("notes.txt"), "keep").unwrap();

        let report = retire_old_versions(root, &VersionId::new(1, 2, 0), "app.exe").unwrap();

        assert_eq!(report.removed, [VersionId::new(1, 0, 0), VersionId::new(1, 1, 0)]);
        assert!(report.deferred.is_empty());
        assert!(!root.join("1.0.0").exists());
        assert!(!root.join("1.1.0").exists());
        assert!(root.join("1.2.0").join("app.exe").exists());
        assert!(root.join("notes.txt").exists());
        assert!(root.exists());
    }

    #[test]
    fn alias_of_current_version_is_never_touched() {
        let tmp = tempfile::tempdir().unwrap();
        make_version(tmp.path(), "1.2.0");
        make_version(tmp.path(), "01.2.0");

        let report =
            retire_old_versions(tmp.path(), &VersionId::new(1, 2, 0), "app.exe").unwrap();

        assert_eq!(report, RetireReport::default());
        assert!(tmp.path().join("01.2.0").join("app.exe").exists());
    }

    #[test]
    fn directory_without_executable_is_still_removed() {
        let tmp = tempfile::tempdir().unwrap();
        make_version(tmp.path(), "1.0.0");
        fs::remove_file(tmp.path().join("1.0.0").join("app.exe")).unwrap();

        let report =
            retire_old_versions(tmp.path(), &VersionId::new(2, 0, 0), "app.exe").unwrap();

        assert_eq!(report.removed, [VersionId::new(1, 0, 0)]);
    }

    #[test]
    fn leased_version_is_left_intact() {
        let tmp = tempfile::tempdir().unwrap();
        make_version(tmp.path(), "1.0.0");
        make_version(tmp.path(), "1.1.0");
        let held = tmp.path().join("1.0.0");
        lease::prepare(&held).unwrap();
        let _lease = hold(&held);

        let report = retire_all(tmp.path(), "app.exe").unwrap();

        assert_eq!(report.deferred, [VersionId::new(1, 0, 0)]);
        assert_eq!(report.removed, [VersionId::new(1, 1, 0)]);
        assert!(held.join("app.exe").exists());
        assert!(held.join("lib").join("data.txt").exists());
    }

    #[cfg(unix)]
    fn hold(dir: &Path) -> lease::RunningLease {
        lease::RunningLease::acquire(dir).unwrap()
    }

    #[cfg(windows)]
    fn hold(dir: &Path) -> fs::File {
        use std::os::windows::fs::OpenOptionsExt;
        // No FILE_SHARE_DELETE: deleting the executable fails like it does for a
        // running image.
        fs::OpenOptions::new()
            .read(true)
            .share_mode(0x1)
            .open(dir.join("app.exe"))
            .unwrap()
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(retire_all(&tmp.path().join("Versions"), "app.exe").is_err());
    }
}
