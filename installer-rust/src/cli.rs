use clap::Parser;
use slipway_core::{InstallContext, InstallScope};
use std::path::Path;

use crate::installer::Mode;

#[derive(Debug, Parser)]
#[command(version, about = "Install or update the application")]
pub struct Cli {
    /// Full install into the installation root containing this executable.
    #[arg(long, conflicts_with = "update")]
    pub install: bool,

    /// Refresh an existing installation without touching shortcuts.
    #[arg(long)]
    pub update: bool,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.install {
            Mode::Install
        } else if self.update {
            Mode::Update
        } else {
            Mode::FirstRun
        }
    }
}

/// Started through the uninstall entry, e.g. `uninstall.exe /CurrentUser`.
pub fn is_uninstaller(exe: &Path) -> bool {
    exe.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase()
        .contains("uninstall")
}

pub fn context_from_switch(args: &[String]) -> Option<InstallContext> {
    args.iter().find_map(|arg| match arg.to_ascii_lowercase().as_str() {
        "/currentuser" => Some(InstallContext::new(InstallScope::PerUser)),
        "/allusers" => Some(InstallContext::new(InstallScope::MachineWide)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninstaller_detected_by_name() {
        assert!(is_uninstaller(Path::new("Harbor").join("uninstall.exe").as_path()));
        assert!(is_uninstaller(Path::new("Uninstall-Harbor")));
        assert!(!is_uninstaller(Path::new("Harbor").join("setup.exe").as_path()));
    }

    #[test]
    fn scope_switch_is_case_insensitive() {
        let args = vec!["/allusers".to_string()];
        assert_eq!(
            context_from_switch(&args).map(|c| c.scope()),
            Some(InstallScope::MachineWide)
        );
        assert!(context_from_switch(&[]).is_none());
    }

    #[test]
    fn no_flag_is_first_run() {
        let cli = Cli::try_parse_from(["setup"]).unwrap();
        assert_eq!(cli.mode(), Mode::FirstRun);
    }
}
