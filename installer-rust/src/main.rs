#![cfg_attr(windows, windows_subsystem = "windows")]

mod cli;
mod config;
mod installer;
mod metadata;
mod payload;
#[cfg(windows)]
mod registry;
mod shell;

use anyhow::{Context, Result};
use clap::Parser;
use slipway_core::{logging, paths, InstallContext, VersionId};
use std::path::{Path, PathBuf};

use cli::{context_from_switch, is_uninstaller, Cli};
use installer::{Mode, Product, Setup, SystemHost};

fn main() -> Result<()> {
    if let Err(err) = logging::init(&logging::logs_dir(config::NAME), "setup.log") {
        eprintln!("warning: logging disabled: {err}");
    }

    let result = run();
    if let Err(err) = &result {
        tracing::error!("setup failed: {err:#}");
    }
    result
}

fn run() -> Result<()> {
    let exe = paths::self_path()?;
    let product = product_from_config()?;
    let mut host = SystemHost::new(&product);

    if is_uninstaller(&exe) {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let root = uninstall_root(&exe, paths::root_override())?;
        let context =
            context_from_switch(&args).unwrap_or_else(|| InstallContext::for_executable(&root));
        let setup = Setup {
            root,
            context,
            product,
            setup_exe: exe,
        };
        installer::uninstall_with_host(&setup, &mut host)?;
        return Ok(());
    }

    let mode = Cli::parse().mode();
    let root = match mode {
        Mode::FirstRun => paths::default_install_root(config::INSTALL_DIR_NAME)?,
        Mode::Install | Mode::Update => discover_root(&exe, paths::root_override())?,
    };
    let context = installer::context_for(mode, &root, dirs::data_local_dir().as_deref());
    let setup = Setup {
        product,
        root,
        context,
        setup_exe: exe,
    };

    let mut assets = payload::assets()?;
    let launcher = payload::launcher()?;
    installer::run_with_host(mode, &setup, &mut assets, launcher, payload::updater(), &mut host)?;
    Ok(())
}

fn product_from_config() -> Result<Product> {
    let version: VersionId = config::VERSION
        .parse()
        .with_context(|| format!("config version {:?}", config::VERSION))?;
    Ok(Product {
        name: config::NAME.to_string(),
        display_name: config::PRODUCT_NAME.to_string(),
        publisher: config::PUBLISHER.to_string(),
        version,
        product_id: config::PRODUCT_ID.to_string(),
    })
}

fn discover_root(exe: &Path, root_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = root_override {
        return Ok(root);
    }
    let start = exe.parent().context("exe has no parent")?;
    Ok(paths::find_installation_root(start, config::INSTALL_DIR_NAME)?)
}

fn uninstall_root(exe: &Path, root_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = root_override {
        return Ok(root);
    }
    Ok(exe.parent().context("exe has no parent")?.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_discovery_honours_override() {
        let root = discover_root(Path::new("anywhere/setup"), Some(PathBuf::from("dev"))).unwrap();
        assert_eq!(root, PathBuf::from("dev"));
    }

    #[test]
    fn configured_version_parses() {
        assert!(product_from_config().is_ok());
    }
}
