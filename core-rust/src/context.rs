//! Per-user versus machine-wide installs.
//!
//! The scope decides which registry hive (or metadata directory) and which
//! shell-integration namespace an operation targets. It is derived from the path
//! of the running executable once per process and then passed down explicitly, so
//! that install, update and uninstall always agree on it.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallScope {
    PerUser,
    MachineWide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallContext {
    scope: InstallScope,
}

impl InstallContext {
    pub const fn new(scope: InstallScope) -> Self {
        Self { scope }
    }

    pub const fn per_user() -> Self {
        Self::new(InstallScope::PerUser)
    }

    /// Per-user when `exe` lies under `per_user_base`.
    pub fn detect(exe: &Path, per_user_base: Option<&Path>) -> Self {
        let per_user = per_user_base.is_some_and(|base| is_under(exe, base));
        if per_user {
            Self::new(InstallScope::PerUser)
        } else {
            Self::new(InstallScope::MachineWide)
        }
    }

    /// Detect against the per-user local data directory (`%LOCALAPPDATA%`,
    /// `~/.local/share`).
    pub fn for_executable(exe: &Path) -> Self {
        let base = dirs::data_local_dir();
        Self::detect(exe, base.as_deref())
    }

    pub fn scope(&self) -> InstallScope {
        self.scope
    }

    pub fn is_per_user(&self) -> bool {
        self.scope == InstallScope::PerUser
    }

    /// Switch appended to the uninstall command.
    pub fn uninstall_switch(&self) -> &'static str {
        match self.scope {
            InstallScope::PerUser => "/CurrentUser",
            InstallScope::MachineWide => "/AllUsers",
        }
    }
}

#[cfg(windows)]
fn is_under(path: &Path, base: &Path) -> bool {
    // NTFS paths compare case-insensitively
    let path = path.to_string_lossy().to_lowercase();
    let base = base.to_string_lossy().to_lowercase();
    Path::new(&path).starts_with(Path::new(&base))
}

#[cfg(not(windows))]
fn is_under(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}
