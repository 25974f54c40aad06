#![cfg_attr(windows, windows_subsystem = "windows")]

mod config;

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::{Context, Result};
use slipway_core::{logging, paths};

fn main() -> Result<()> {
    let exe = paths::self_path()?;
    let exe_name = exe_name(&exe)?;
    let root = installation_root(&exe, paths::root_override())?;

    if let Err(err) = logging::init(&logging::logs_dir(config::NAME), "launcher.log") {
        eprintln!("warning: logging disabled: {err}");
    }

    match run_updater(&root) {
        UpdaterRun::Updated => tracing::info!("update applied before launch"),
        UpdaterRun::Absent | UpdaterRun::Finished => {}
    }

    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    if let Err(err) = slipway_core::launch(&root, &exe_name, &args) {
        tracing::error!("cannot start {}: {err}", config::PRODUCT_NAME);
        return Err(err).with_context(|| format!("launch from {}", root.display()));
    }
    Ok(())
}

fn exe_name(exe: &Path) -> Result<String> {
    let name = exe
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    if name.is_empty() {
        anyhow::bail!("executable name is empty");
    }
    Ok(name.to_string())
}

/// Exit code of the updater after setup applied an update.
const UPDATER_APPLIED: i32 = 10;

#[derive(Debug, PartialEq, Eq)]
enum UpdaterRun {
    Absent,
    Finished,
    Updated,
}

/// Run `updater` from the installation root, if installed, before resolving the
/// version to start. Its failures never block the launch.
fn run_updater(root: &Path) -> UpdaterRun {
    let updater = root.join(paths::exe_file_name("updater"));
    if !updater.is_file() {
        return UpdaterRun::Absent;
    }

    let mut cmd = Command::new(&updater);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    match cmd.status() {
        Ok(status) if status.code() == Some(UPDATER_APPLIED) => UpdaterRun::Updated,
        Ok(status) => {
            if !status.success() {
                tracing::warn!("updater exited with {status}");
            }
            UpdaterRun::Finished
        }
        Err(err) => {
            tracing::warn!("cannot run {}: {err}", updater.display());
            UpdaterRun::Finished
        }
    }
}

/// The launcher lives directly in the installation root.
fn installation_root(exe: &Path, root_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = root_override {
        return Ok(root);
    }
    exe.parent()
        .map(Path::to_path_buf)
        .with_context(|| format!("{} has no parent directory", exe.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_launcher_directory() {
        let exe = PathBuf::from("Harbor").join("Harbor.exe");
        assert_eq!(installation_root(&exe, None).unwrap(), PathBuf::from("Harbor"));
    }

    #[test]
    fn override_wins() {
        let exe = PathBuf::from("Harbor").join("Harbor.exe");
        let root = installation_root(&exe, Some(PathBuf::from("dev-root"))).unwrap();
        assert_eq!(root, PathBuf::from("dev-root"));
    }

    #[test]
    fn exe_name_keeps_extension() {
        let exe = PathBuf::from("Harbor").join("Harbor.exe");
        assert_eq!(exe_name(&exe).unwrap(), "Harbor.exe");
    }

    #[test]
    fn missing_updater_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(run_updater(tmp.path()), UpdaterRun::Absent);
    }

    #[cfg(unix)]
    fn script(root: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = root.join("updater");
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn updater_exit_codes() {
        for (code, expected) in [
            (10, UpdaterRun::Updated),
            (0, UpdaterRun::Finished),
            (3, UpdaterRun::Finished),
        ] {
            let tmp = tempfile::tempdir().unwrap();
            script(tmp.path(), &format!("#!/bin/sh\nexit {code}\n"));
            assert_eq!(run_updater(tmp.path()), expected, "exit {code}");
        }
    }

    #[test]
    fn exe_name_rejects_empty() {
        let err = exe_name(Path::new("")).unwrap_err();
        assert!(err.to_string().contains("executable name is empty"));
    }
}
