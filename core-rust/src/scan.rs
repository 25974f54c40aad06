use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use crate::error::{IoContext, Result, SlipwayError};
use crate::version::VersionId;

/// A child of the versions root whose name parsed as a [`VersionId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDirectory {
    pub version: VersionId,
    pub path: PathBuf,
}

impl VersionDirectory {
    pub fn main_executable(&self, exe_name: impl AsRef<Path>) -> PathBuf {
        self.path.join(exe_name)
    }
}

/// List the version directories directly under `root`.
///
/// Files, symlinks, non UTF-8 names and names that do not parse are skipped.
/// A missing root, or one that is not a directory, is an error.
/// The result is sorted by version, then path.
pub fn scan(root: &Path) -> Result<Vec<VersionDirectory>> {
    let meta = fs::metadata(root).map_err(|source| SlipwayError::VersionsRootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(SlipwayError::VersionsRootNotADirectory(root.to_path_buf()));
    }

    let entries = fs::read_dir(root).map_err(|source| SlipwayError::VersionsRootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut found = Vec::new();
    for ent in entries {
        let ent = ent.io_context(|| format!("read_dir {}", root.display()))?;
        let file_type = match ent.file_type() {
            Ok(file_type) => file_type,
            // Removed between listing and inspection
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(err).io_context(|| format!("file_type {}", ent.path().display()))
            }
        };
        if !file_type.is_dir() {
            continue;
        }
        let name = ent.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        match VersionId::parse(name) {
            Ok(version) => found.push(VersionDirectory {
                version,
                path: ent.path(),
            }),
            Err(err) => tracing::debug!("skipping {}: {err}", ent.path().display()),
        }
    }

    found.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.path.cmp(&b.path)));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_skips_files_and_unparsable_names() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for d in ["1.0.0", "1.2.0", "bogus", "2", "1.1.9"] {
            fs::create_dir_all(root.join(d)).unwrap();
        }
        fs::write(root.join("3.0.0"), "not a dir").unwrap();

        let found = scan(root).unwrap();
        let versions: Vec<String> = found.iter().map(|d| d.version.to_string()).collect();
        assert_eq!(versions, ["1.0.0", "1.1.9", "1.2.0"]);
        assert_eq!(found[2].path, root.join("1.2.0"));
    }

    #[test]
    fn scan_of_empty_root_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(scan(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn scan_of_missing_root_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = scan(&tmp.path().join("Versions")).unwrap_err();
        assert!(matches!(err, SlipwayError::VersionsRootUnreadable { .. }));
    }

    #[test]
    fn scan_of_file_root_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("Versions");
        fs::write(&file, "x").unwrap();
        let err = scan(&file).unwrap_err();
        assert!(matches!(err, SlipwayError::VersionsRootNotADirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn scan_does_not_follow_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("Versions");
        let elsewhere = tmp.path().join("elsewhere");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&elsewhere).unwrap();
        std::os::unix::fs::symlink(&elsewhere, root.join("9.9.9")).unwrap();
        assert!(scan(&root).unwrap().is_empty());
    }
}
