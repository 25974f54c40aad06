use std::path::{Path, PathBuf};

use crate::error::{Result, SlipwayError};
use crate::version::VersionId;

pub const VERSIONS_DIR: &str = "Versions";

/// Development override for the installation root.
pub const ROOT_ENV: &str = "SLIPWAY_ROOT";

/// How many ancestors [`find_installation_root`] inspects before giving up.
pub const MAX_ROOT_DEPTH: usize = 16;

pub fn versions_root(installation_root: &Path) -> PathBuf {
    installation_root.join(VERSIONS_DIR)
}

pub fn version_dir(installation_root: &Path, version: &VersionId) -> PathBuf {
    versions_root(installation_root).join(version.to_string())
}

/// `name` plus the platform executable suffix (`.exe` on Windows).
pub fn exe_file_name(name: &str) -> String {
    format!("{name}{}", std::env::consts::EXE_SUFFIX)
}

pub fn self_path() -> Result<PathBuf> {
    std::env::current_exe().map_err(|source| SlipwayError::Io {
        context: "current_exe".to_string(),
        source,
    })
}

pub fn root_override() -> Option<PathBuf> {
    std::env::var_os(ROOT_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Walk from `start` up through its ancestors until a directory named `sentinel`
/// is found.
pub fn find_installation_root(start: &Path, sentinel: &str) -> Result<PathBuf> {
    let mut current = start;
    for _ in 0..MAX_ROOT_DEPTH {
        if current.file_name().is_some_and(|name| name == sentinel) {
            return Ok(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Err(SlipwayError::InstallationRootNotFound {
        start: start.to_path_buf(),
        sentinel: sentinel.to_string(),
    })
}

/// Per-user location used when setup runs without a flag.
pub fn default_install_root(install_dir_name: &str) -> Result<PathBuf> {
    let base = dirs::data_local_dir().ok_or_else(|| SlipwayError::Io {
        context: "locate per-user data directory".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no home directory"),
    })?;
    Ok(base.join(install_dir_name))
}
