//! Install metadata read by the OS and by the update service.
//!
//! On Windows both entries go to the registry (32-bit view) under HKCU or HKLM
//! depending on the install context. Elsewhere they are JSON documents in a
//! per-product configuration directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use slipway_core::{paths, InstallContext, VersionId};
use std::path::{Path, PathBuf};

#[cfg(not(windows))]
use std::fs;

#[cfg(not(windows))]
pub const UNINSTALL_FILE: &str = "uninstall.json";
#[cfg(not(windows))]
pub const UPDATE_CLIENT_FILE: &str = "update-client.json";

/// What "Apps & features" shows and runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UninstallEntry {
    pub display_name: String,
    pub display_version: String,
    pub publisher: String,
    pub install_location: PathBuf,
    pub uninstall_string: String,
}

impl UninstallEntry {
    pub fn new(
        display_name: &str,
        publisher: &str,
        version: &VersionId,
        root: &Path,
        ctx: InstallContext,
    ) -> Self {
        let uninstaller = root.join(paths::exe_file_name("uninstall"));
        Self {
            display_name: display_name.to_string(),
            display_version: version.to_string(),
            publisher: publisher.to_string(),
            install_location: root.to_path_buf(),
            uninstall_string: format!("\"{}\" {}", uninstaller.display(), ctx.uninstall_switch()),
        }
    }
}

/// Registration with the update service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateClientEntry {
    pub product_id: String,
    /// Four-part product version, `<major>.<minor>.<patch>.0`.
    pub pv: String,
    pub name: String,
}

impl UpdateClientEntry {
    pub fn new(product_id: &str, name: &str, version: &VersionId) -> Self {
        Self {
            product_id: product_id.to_string(),
            pv: format!("{version}.0"),
            name: name.to_string(),
        }
    }
}

const UNINSTALL_PARENT: &str = r"Software\Microsoft\Windows\CurrentVersion\Uninstall";

pub fn uninstall_key(name: &str) -> String {
    format!(r"{UNINSTALL_PARENT}\{name}")
}

pub fn update_clients_key(name: &str) -> String {
    format!(r"Software\{name}\Update\Clients")
}

/// JSON documents in one directory.
#[cfg(not(windows))]
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

#[cfg(not(windows))]
impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<config dir>/<name>` per user, `/etc/<name>` machine-wide.
    pub fn for_context(ctx: InstallContext, name: &str) -> Result<Self> {
        if ctx.is_per_user() {
            let base = dirs::config_dir().context("no per-user configuration directory")?;
            Ok(Self::new(base.join(name)))
        } else {
            Ok(Self::new(Path::new("/etc").join(name)))
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write<T: Serialize>(&self, file_name: &str, value: &T) -> Result<()> {
        let contents = serde_json::to_string_pretty(value)
            .with_context(|| format!("serialize {file_name}"))?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create {}", self.dir.display()))?;
        let path = self.dir.join(file_name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read<T: serde::de::DeserializeOwned>(&self, file_name: &str) -> Result<T> {
        let path = self.dir.join(file_name);
        let s = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&s).with_context(|| format!("parse {file_name}"))
    }

    /// Remove the documents and the directory once empty.
    pub fn clear(&self) -> Result<()> {
        for file_name in [UNINSTALL_FILE, UPDATE_CLIENT_FILE] {
            let path = self.dir.join(file_name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("remove {}", path.display()))
                }
            }
        }
        if !slipway_core::fs_ops::remove_dir_if_empty(&self.dir)? {
            tracing::debug!("keeping {}: not empty", self.dir.display());
        }
        Ok(())
    }
}

#[cfg(not(windows))]
pub fn write_uninstall_entry(ctx: InstallContext, name: &str, entry: &UninstallEntry) -> Result<()> {
    JsonStore::for_context(ctx, name)?.write(UNINSTALL_FILE, entry)
}

#[cfg(not(windows))]
pub fn write_update_client(ctx: InstallContext, name: &str, entry: &UpdateClientEntry) -> Result<()> {
    JsonStore::for_context(ctx, name)?.write(UPDATE_CLIENT_FILE, entry)
}

#[cfg(not(windows))]
pub fn remove(ctx: InstallContext, name: &str, _product_id: &str) -> Result<()> {
    JsonStore::for_context(ctx, name)?.clear()
}

#[cfg(windows)]
pub fn write_uninstall_entry(ctx: InstallContext, name: &str, entry: &UninstallEntry) -> Result<()> {
    use crate::registry::{hive, Key};

    let key = Key::create(hive(ctx), &uninstall_key(name))?;
    key.set_string("", &entry.install_location.display().to_string())?;
    key.set_string("DisplayName", &entry.display_name)?;
    key.set_string("DisplayVersion", &entry.display_version)?;
    key.set_string("Publisher", &entry.publisher)?;
    key.set_string("InstallLocation", &entry.install_location.display().to_string())?;
    key.set_string("UninstallString", &entry.uninstall_string)?;
    Ok(())
}

#[cfg(windows)]
pub fn write_update_client(ctx: InstallContext, name: &str, entry: &UpdateClientEntry) -> Result<()> {
    use crate::registry::{hive, Key};

    let path = format!(r"{}\{}", update_clients_key(name), entry.product_id);
    let key = Key::create(hive(ctx), &path)?;
    key.set_string("pv", &entry.pv)?;
    key.set_string("name", &entry.name)?;
    Ok(())
}

#[cfg(windows)]
pub fn remove(ctx: InstallContext, name: &str, product_id: &str) -> Result<()> {
    use crate::registry::{delete_tree, hive};

    delete_tree(hive(ctx), UNINSTALL_PARENT, name)?;
    delete_tree(hive(ctx), &update_clients_key(name), product_id)
}
