//! Extraction of a version's assets into its own version directory

use std::{
    fs,
    io::{Read, Seek},
    path::{Component, Path, PathBuf},
};

use crate::error::{IoContext, Result, SlipwayError};
use crate::{fs_ops, lease, paths, version::VersionId};

/// One file of a version, relative to its version directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl Asset {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// Anything that can enumerate the files of a version.
pub trait AssetSource {
    fn assets(&mut self) -> Result<Vec<Asset>>;
}

impl AssetSource for Vec<Asset> {
    fn assets(&mut self) -> Result<Vec<Asset>> {
        Ok(self.clone())
    }
}

/// Assets stored in a zip archive, e.g. the payload embedded in the setup binary.
pub struct ZipAssets<R> {
    archive: zip::ZipArchive<R>,
}

impl<R: Read + Seek> ZipAssets<R> {
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            archive: zip::ZipArchive::new(reader)?,
        })
    }
}

impl<R: Read + Seek> AssetSource for ZipAssets<R> {
    fn assets(&mut self) -> Result<Vec<Asset>> {
        let mut out = Vec::with_capacity(self.archive.len());
        for i in 0..self.archive.len() {
            let mut entry = self.archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let path = PathBuf::from(entry.name());
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut buf)
                .io_context(|| format!("read {} from archive", path.display()))?;
            out.push(Asset::new(path, buf));
        }
        Ok(out)
    }
}

/// Assets taken from a directory tree on disk.
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collect(&self, dir: &Path, out: &mut Vec<Asset>) -> Result<()> {
        let entries = fs::read_dir(dir).io_context(|| format!("read_dir {}", dir.display()))?;
        for ent in entries {
            let ent = ent.io_context(|| format!("read_dir {}", dir.display()))?;
            let path = ent.path();
            let file_type = ent
                .file_type()
                .io_context(|| format!("file_type {}", path.display()))?;
            if file_type.is_dir() {
                self.collect(&path, out)?;
            } else if file_type.is_file() {
                let rel = path.strip_prefix(&self.root).unwrap_or(&path).to_path_buf();
                let contents = fs::read(&path).io_context(|| format!("read {}", path.display()))?;
                out.push(Asset::new(rel, contents));
            }
        }
        Ok(())
    }
}

impl AssetSource for DirAssets {
    fn assets(&mut self) -> Result<Vec<Asset>> {
        let mut out = Vec::new();
        self.collect(&self.root, &mut out)?;
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub version_dir: PathBuf,
    pub written: usize,
    pub unchanged: usize,
}

/// Write every asset of `version` into `Versions/<version>` under
/// `installation_root`.
///
/// Files that already hold the right bytes are left alone, so running this again
/// for the same version (even while that version is running) is harmless.
pub fn install(
    installation_root: &Path,
    version: &VersionId,
    source: &mut dyn AssetSource,
) -> Result<InstallReport> {
    let version_dir = paths::version_dir(installation_root, version);
    fs::create_dir_all(&version_dir)
        .io_context(|| format!("create {}", version_dir.display()))?;

    let mut report = InstallReport {
        version_dir: version_dir.clone(),
        ..InstallReport::default()
    };
    for asset in source.assets()? {
        check_relative(&asset.path)?;
        let dest = version_dir.join(&asset.path);
        if fs_ops::write_if_changed(&dest, &asset.contents)? {
            tracing::debug!("wrote {}", dest.display());
            report.written += 1;
        } else {
            report.unchanged += 1;
        }
    }
    lease::prepare(&version_dir)?;

    tracing::info!(
        "installed {version} into {} ({} written, {} unchanged)",
        version_dir.display(),
        report.written,
        report.unchanged
    );
    Ok(report)
}

fn check_relative(path: &Path) -> Result<()> {
    let escapes = path.is_absolute()
        || path.components().any(|c| {
            matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir)
        });
    let empty = path.components().all(|c| matches!(c, Component::CurDir));
    if escapes || empty {
        return Err(SlipwayError::InvalidAssetPath(path.display().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn install_writes_into_version_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut assets = vec![
            Asset::new("app.exe", b"binary".to_vec()),
            Asset::new("lib/data.txt", b"data".to_vec()),
        ];
        let version = VersionId::new(1, 0, 0);

        let report = install(tmp.path(), &version, &mut assets).unwrap();

        let dir = tmp.path().join("Versions").join("1.0.0");
        assert_eq!(report.version_dir, dir);
        assert_eq!(report.written, 2);
        assert_eq!(fs::read(dir.join("app.exe")).unwrap(), b"binary");
        assert_eq!(fs::read(dir.join("lib").join("data.txt")).unwrap(), b"data");
        assert!(lease::lease_path(&dir).exists());
    }

    #[test]
    fn install_twice_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut assets = vec![Asset::new("app.exe", b"binary".to_vec())];
        let version = VersionId::new(1, 0, 0);

        install(tmp.path(), &version, &mut assets).unwrap();
        let report = install(tmp.path(), &version, &mut assets).unwrap();

        assert_eq!(report.written, 0);
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn install_rejects_escaping_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let version = VersionId::new(1, 0, 0);
        for bad in ["../evil.exe", "a/../../evil.exe", ""] {
            let mut assets = vec![Asset::new(bad, b"x".to_vec())];
            let err = install(tmp.path(), &version, &mut assets).unwrap_err();
            assert!(matches!(err, SlipwayError::InvalidAssetPath(_)), "{bad:?}");
        }
        assert!(!tmp.path().join("evil.exe").exists());
    }

    #[test]
    fn zip_assets_skip_directory_entries() {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::FileOptions::default();
            zip.add_directory("lib/", options).unwrap();
            zip.start_file("lib/a.txt", options).unwrap();
            zip.write_all(b"a").unwrap();
            zip.start_file("app.exe", options).unwrap();
            zip.write_all(b"exe").unwrap();
            zip.finish().unwrap();
        }
        buf.set_position(0);

        let mut source = ZipAssets::new(buf).unwrap();
        let assets = source.assets().unwrap();
        let names: Vec<_> = assets.iter().map(|a| a.path.clone()).collect();
        assert_eq!(names, [PathBuf::from("lib/a.txt"), PathBuf::from("app.exe")]);
        assert_eq!(assets[1].contents, b"exe");
    }

    #[test]
    fn dir_assets_are_relative_to_root() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("app.exe"), "exe").unwrap();
        fs::write(tmp.path().join("sub").join("b.txt"), "b").unwrap();

        let assets = DirAssets::new(tmp.path()).assets().unwrap();
        let names: Vec<_> = assets.iter().map(|a| a.path.clone()).collect();
        assert_eq!(
            names,
            [PathBuf::from("app.exe"), PathBuf::from("sub").join("b.txt")]
        );
    }
}
