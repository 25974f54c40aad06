use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use slipway_core::{latest_installed, paths, SlipwayError, VersionId};
use std::{
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
    process::Command,
};

use crate::config;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub version: String,
    pub installer_url: String,
    #[serde(default)]
    pub sha256: String,
}

impl Manifest {
    pub fn offered_version(&self) -> Result<VersionId> {
        if self.installer_url.trim().is_empty() {
            bail!("manifest installer_url is empty");
        }
        self.version
            .trim()
            .parse()
            .with_context(|| format!("manifest version {:?}", self.version))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    NoUpdate,
    Updated,
}

/// Never fails: anything that goes wrong means there is no update this time.
pub fn run() -> UpdateOutcome {
    match run_inner() {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!("updater failed: {err:#}");
            UpdateOutcome::NoUpdate
        }
    }
}

fn run_inner() -> Result<UpdateOutcome> {
    if !config::AUTO_UPDATE_ENABLED {
        tracing::debug!("automatic updates are disabled");
        return Ok(UpdateOutcome::NoUpdate);
    }
    let manifest_url = config::UPDATE_MANIFEST_URL.trim();
    if manifest_url.is_empty() {
        return Ok(UpdateOutcome::NoUpdate);
    }

    let root = installation_root()?;
    let installed = installed_version(&root)?;
    let manifest = fetch_manifest(manifest_url)?;
    let offered = manifest.offered_version()?;
    if !needs_update(installed.as_ref(), &offered) {
        tracing::info!("{offered} offered, nothing newer than what is installed");
        return Ok(UpdateOutcome::NoUpdate);
    }

    tracing::info!("updating to {offered}");
    let installer_path = download_installer(&manifest)?;
    run_installer(&installer_path, &root)?;
    Ok(UpdateOutcome::Updated)
}

fn installation_root() -> Result<PathBuf> {
    if let Some(root) = paths::root_override() {
        return Ok(root);
    }
    let exe = paths::self_path()?;
    let start = exe.parent().context("exe has no parent")?;
    Ok(paths::find_installation_root(start, config::INSTALL_DIR_NAME)?)
}

/// `None` when nothing is installed yet.
pub fn installed_version(root: &Path) -> Result<Option<VersionId>> {
    match latest_installed(&paths::versions_root(root)) {
        Ok(dir) => Ok(Some(dir.version)),
        Err(SlipwayError::NoVersionFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub fn needs_update(installed: Option<&VersionId>, offered: &VersionId) -> bool {
    installed.map_or(true, |current| offered > current)
}

fn fetch_manifest(url: &str) -> Result<Manifest> {
    let resp = reqwest::blocking::get(url)
        .with_context(|| format!("fetch manifest {url}"))?
        .error_for_status()
        .with_context(|| format!("manifest request failed for {url}"))?;
    resp.json::<Manifest>().context("parse manifest JSON")
}

fn download_installer(manifest: &Manifest) -> Result<PathBuf> {
    let mut resp = reqwest::blocking::get(&manifest.installer_url)
        .with_context(|| format!("download installer {}", manifest.installer_url))?
        .error_for_status()
        .context("installer request failed")?;
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{}-setup-", config::NAME))
        .suffix(std::env::consts::EXE_SUFFIX)
        .tempfile()
        .context("create temp installer file")?;
    io::copy(&mut resp, &mut file).context("write installer to temp file")?;

    if !manifest.sha256.trim().is_empty() {
        let actual = sha256_file(file.path())?;
        let expected = normalize_hex(&manifest.sha256);
        if actual != expected {
            bail!("installer sha256 mismatch: expected {expected}, got {actual}");
        }
    }

    let (_, path) = file.keep().context("persist temp installer file")?;
    make_executable(&path)?;
    Ok(path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn normalize_hex(value: &str) -> String {
    value
        .trim()
        .trim_start_matches("sha256:")
        .to_ascii_lowercase()
}

/// Waits for setup so that the launcher which started us sees the new version.
fn run_installer(path: &Path, root: &Path) -> Result<()> {
    let status = Command::new(path)
        .arg("--update")
        .env(paths::ROOT_ENV, root)
        .status()
        .with_context(|| format!("launch installer {}", path.display()))?;
    if !status.success() {
        bail!("installer {} exited with {status}", path.display());
    }
    Ok(())
}
