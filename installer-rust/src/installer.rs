use anyhow::{bail, Context, Result};
use slipway_core::{
    fs_ops, install, paths, retire_all, retire_old_versions, AssetSource, InstallContext,
    RetireReport, VersionId,
};
use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::metadata::{self, UninstallEntry, UpdateClientEntry};
use crate::shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `--install`: full install into the discovered root.
    Install,
    /// `--update`: refresh binaries and the update registration only.
    Update,
    /// No flag: install into the per-user default root.
    FirstRun,
}

/// Identity of the product being installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// File-system name: launcher stem, registry key and shortcut name.
    pub name: String,
    pub display_name: String,
    pub publisher: String,
    pub version: VersionId,
    pub product_id: String,
}

impl Product {
    /// File name shared by the launcher and each version's main binary.
    pub fn main_exe(&self) -> String {
        paths::exe_file_name(&self.name)
    }

    pub fn uninstall_entry(&self, root: &Path, ctx: InstallContext) -> UninstallEntry {
        UninstallEntry::new(&self.display_name, &self.publisher, &self.version, root, ctx)
    }

    pub fn update_client_entry(&self) -> UpdateClientEntry {
        UpdateClientEntry::new(&self.product_id, &self.display_name, &self.version)
    }
}

/// Side effects outside the installation root.
pub trait Host {
    fn write_uninstall_entry(&mut self, ctx: InstallContext, entry: &UninstallEntry) -> Result<()>;
    fn write_update_client(&mut self, ctx: InstallContext, entry: &UpdateClientEntry) -> Result<()>;
    fn remove_metadata(&mut self, ctx: InstallContext) -> Result<()>;
    fn create_shortcut(&mut self, ctx: InstallContext, target: &Path) -> Result<()>;
    fn register_context_menu(&mut self, ctx: InstallContext, target: &Path) -> Result<()>;
    fn remove_shell_integration(&mut self, ctx: InstallContext) -> Result<()>;
    fn launch(&mut self, launcher: &Path) -> Result<()>;
}

/// Registry or config files, real shortcuts, real processes.
pub struct SystemHost {
    name: String,
    label: String,
    product_id: String,
}

impl SystemHost {
    pub fn new(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            label: product.display_name.clone(),
            product_id: product.product_id.clone(),
        }
    }
}

impl Host for SystemHost {
    fn write_uninstall_entry(&mut self, ctx: InstallContext, entry: &UninstallEntry) -> Result<()> {
        metadata::write_uninstall_entry(ctx, &self.name, entry)
    }

    fn write_update_client(&mut self, ctx: InstallContext, entry: &UpdateClientEntry) -> Result<()> {
        metadata::write_update_client(ctx, &self.name, entry)
    }

    fn remove_metadata(&mut self, ctx: InstallContext) -> Result<()> {
        metadata::remove(ctx, &self.name, &self.product_id)
    }

    fn create_shortcut(&mut self, ctx: InstallContext, target: &Path) -> Result<()> {
        let dir = shell::programs_dir(ctx)?;
        shell::create_shortcut(&dir, &self.name, &self.label, target)?;
        Ok(())
    }

    fn register_context_menu(&mut self, ctx: InstallContext, target: &Path) -> Result<()> {
        shell::register_context_menu(ctx, &self.name, &self.label, target)
    }

    fn remove_shell_integration(&mut self, ctx: InstallContext) -> Result<()> {
        shell::remove_shortcut(&shell::programs_dir(ctx)?, &self.name)?;
        shell::remove_context_menu(ctx, &self.name)
    }

    fn launch(&mut self, launcher: &Path) -> Result<()> {
        let mut cmd = Command::new(launcher);
        if let Some(dir) = launcher.parent() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("launch {}", launcher.display()))?;
        Ok(())
    }
}

/// Everything a setup run needs to know about where it runs.
#[derive(Debug, Clone)]
pub struct Setup {
    pub product: Product,
    pub root: PathBuf,
    pub context: InstallContext,
    /// The running setup executable, copied as the uninstaller.
    pub setup_exe: PathBuf,
}

/// Scope of a setup run. An existing installation keeps the scope of its root,
/// wherever this setup binary was started from (the updater runs it from a temp
/// directory).
pub fn context_for(mode: Mode, root: &Path, per_user_base: Option<&Path>) -> InstallContext {
    match mode {
        Mode::FirstRun => InstallContext::per_user(),
        Mode::Install | Mode::Update => InstallContext::detect(root, per_user_base),
    }
}

impl Setup {
    pub fn launcher_path(&self) -> PathBuf {
        self.root.join(self.product.main_exe())
    }

    pub fn versions_root(&self) -> PathBuf {
        paths::versions_root(&self.root)
    }

    pub fn updater_path(&self) -> PathBuf {
        self.root.join(paths::exe_file_name("updater"))
    }
}

pub fn run_with_host(
    mode: Mode,
    setup: &Setup,
    assets: &mut dyn AssetSource,
    launcher: &[u8],
    updater: Option<&[u8]>,
    host: &mut dyn Host,
) -> Result<RetireReport> {
    let product = &setup.product;
    tracing::info!(
        "{mode:?} {} {} into {} ({:?})",
        product.display_name,
        product.version,
        setup.root.display(),
        setup.context.scope()
    );

    fs::create_dir_all(&setup.root)
        .with_context(|| format!("create {}", setup.root.display()))?;

    let launcher_path = setup.launcher_path();
    if fs_ops::write_if_changed(&launcher_path, launcher)? {
        tracing::info!("wrote launcher {}", launcher_path.display());
    }
    if let Some(updater) = updater {
        let updater_path = setup.updater_path();
        if fs_ops::write_if_changed(&updater_path, updater)? {
            tracing::info!("wrote updater {}", updater_path.display());
        }
    }

    let report = install(&setup.root, &product.version, assets)?;
    let main_exe = report.version_dir.join(product.main_exe());
    if !main_exe.is_file() {
        bail!("payload does not contain {}", product.main_exe());
    }

    if mode != Mode::Update {
        ensure_uninstaller(&setup.root, &setup.setup_exe)?;
        host.write_uninstall_entry(setup.context, &product.uninstall_entry(&setup.root, setup.context))?;
    }
    host.write_update_client(setup.context, &product.update_client_entry())?;

    if mode != Mode::Update {
        host.create_shortcut(setup.context, &launcher_path)
            .context("create shortcut")?;
        host.register_context_menu(setup.context, &launcher_path)
            .context("register context menu")?;
    }

    let retired = retire_old_versions(&setup.versions_root(), &product.version, &product.main_exe())?;
    log_retirement(&retired);

    if mode != Mode::Update {
        host.launch(&launcher_path)?;
    }
    Ok(retired)
}

/// Remove everything an install created. Versions still running stay behind,
/// together with the launcher, and are picked up by a later uninstall.
pub fn uninstall_with_host(setup: &Setup, host: &mut dyn Host) -> Result<RetireReport> {
    tracing::info!(
        "uninstalling {} from {} ({:?})",
        setup.product.display_name,
        setup.root.display(),
        setup.context.scope()
    );

    if let Err(err) = host.remove_shell_integration(setup.context) {
        tracing::warn!("shell integration not removed: {err:#}");
    }
    if let Err(err) = host.remove_metadata(setup.context) {
        tracing::warn!("install metadata not removed: {err:#}");
    }

    let versions_root = setup.versions_root();
    let report = if versions_root.is_dir() {
        retire_all(&versions_root, &setup.product.main_exe())?
    } else {
        RetireReport::default()
    };
    log_retirement(&report);

    if report.deferred.is_empty() && report.incomplete.is_empty() {
        remove_if_present(&setup.launcher_path())?;
        remove_if_present(&setup.updater_path())?;
        match fs_ops::remove_dir_if_empty(&versions_root) {
            Ok(true) => {}
            Ok(false) => tracing::debug!("keeping {}: not empty", versions_root.display()),
            Err(err) => tracing::warn!("{err}"),
        }
    } else {
        tracing::warn!("some versions are still in use; run the uninstaller again after closing them");
    }
    Ok(report)
}

fn log_retirement(report: &RetireReport) {
    for v in &report.removed {
        tracing::info!("removed version {v}");
    }
    for v in &report.deferred {
        tracing::info!("version {v} is in use, kept");
    }
    for v in &report.incomplete {
        tracing::warn!("version {v} only partially removed");
    }
}

fn ensure_uninstaller(root: &Path, setup_exe: &Path) -> Result<PathBuf> {
    let dest = root.join(paths::exe_file_name("uninstall"));
    if dest != setup_exe {
        fs_ops::copy_if_changed(setup_exe, &dest)?;
    }
    Ok(dest)
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_core::InstallScope;

    fn product() -> Product {
        Product {
            name: "Harbor".to_string(),
            display_name: "Harbor".to_string(),
            publisher: "Harbor Labs".to_string(),
            version: VersionId::new(1, 0, 0),
            product_id: "{ID}".to_string(),
        }
    }

    #[test]
    fn launcher_sits_in_root() {
        let setup = Setup {
            product: product(),
            root: PathBuf::from("Harbor"),
            context: InstallContext::new(InstallScope::PerUser),
            setup_exe: PathBuf::from("setup"),
        };
        assert_eq!(
            setup.launcher_path(),
            PathBuf::from("Harbor").join(paths::exe_file_name("Harbor"))
        );
        assert_eq!(setup.versions_root(), PathBuf::from("Harbor").join("Versions"));
    }

    #[test]
    fn existing_installation_keeps_scope_of_its_root() {
        let base = PathBuf::from("/home/ann/.local/share");
        let per_user = base.join("Harbor");
        let machine = PathBuf::from("/opt/Harbor");

        assert!(context_for(Mode::Update, &per_user, Some(&base)).is_per_user());
        assert!(context_for(Mode::Install, &per_user, Some(&base)).is_per_user());
        assert!(!context_for(Mode::Update, &machine, Some(&base)).is_per_user());
        assert!(context_for(Mode::FirstRun, &machine, Some(&base)).is_per_user());
    }

    #[test]
    fn uninstaller_is_copied_next_to_launcher() {
        let tmp = tempfile::tempdir().unwrap();
        let setup_exe = tmp.path().join("setup.bin");
        fs::write(&setup_exe, "setup").unwrap();
        let root = tmp.path().join("Harbor");
        fs::create_dir_all(&root).unwrap();

        let dest = ensure_uninstaller(&root, &setup_exe).unwrap();

        assert_eq!(dest, root.join(paths::exe_file_name("uninstall")));
        assert_eq!(fs::read_to_string(dest).unwrap(), "setup");
    }

    #[test]
    fn running_uninstaller_is_not_copied_onto_itself() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join(paths::exe_file_name("uninstall"));
        fs::write(&dest, "setup").unwrap();

        assert_eq!(ensure_uninstaller(tmp.path(), &dest).unwrap(), dest);
    }
}
