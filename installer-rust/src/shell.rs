use anyhow::{bail, Context, Result};
use slipway_core::InstallContext;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[cfg(windows)]
const SHORTCUT_EXT: &str = "lnk";
#[cfg(not(windows))]
const SHORTCUT_EXT: &str = "desktop";

/// Where shortcuts live for `ctx`: the Start-Menu `Programs` folder on Windows,
/// the freedesktop `applications` directory elsewhere.
#[cfg(windows)]
pub fn programs_dir(ctx: InstallContext) -> Result<PathBuf> {
    let base = if ctx.is_per_user() {
        std::env::var("APPDATA").context("APPDATA not set")?
    } else {
        std::env::var("ProgramData").context("ProgramData not set")?
    };
    Ok(PathBuf::from(base)
        .join("Microsoft")
        .join("Windows")
        .join("Start Menu")
        .join("Programs"))
}

#[cfg(not(windows))]
pub fn programs_dir(ctx: InstallContext) -> Result<PathBuf> {
    if ctx.is_per_user() {
        let base = dirs::data_dir().context("no per-user data directory")?;
        Ok(base.join("applications"))
    } else {
        Ok(PathBuf::from("/usr/share/applications"))
    }
}

pub fn shortcut_path(dir: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() {
        bail!("shortcut name is empty");
    }
    Ok(dir.join(format!("{name}.{SHORTCUT_EXT}")))
}

#[cfg(windows)]
pub fn create_shortcut(dir: &Path, name: &str, label: &str, target: &Path) -> Result<PathBuf> {
    use std::process::Command;

    let lnk_path = shortcut_path(dir, name)?;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

    let lnk = ps_quote(&lnk_path.display().to_string());
    let tgt = ps_quote(&target.display().to_string());
    let desc = ps_quote(label);
    let work = target
        .parent()
        .map(|p| ps_quote(&p.display().to_string()))
        .unwrap_or_else(|| "''".to_string());

    let script = format!(
        "$WshShell = New-Object -ComObject WScript.Shell; \
         $Shortcut = $WshShell.CreateShortcut({lnk}); \
         $Shortcut.TargetPath = {tgt}; \
         $Shortcut.WorkingDirectory = {work}; \
         $Shortcut.IconLocation = {tgt}; \
         $Shortcut.Description = {desc}; \
         $Shortcut.Save();"
    );

    let status = Command::new("powershell")
        .arg("-NoProfile")
        .arg("-NonInteractive")
        .arg("-Command")
        .arg(script)
        .status()
        .context("run powershell")?;

    if !status.success() {
        bail!("failed to create shortcut (exit {:?})", status.code());
    }

    Ok(lnk_path)
}

#[cfg(windows)]
fn ps_quote(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    format!("'{}'", escaped)
}

#[cfg(not(windows))]
pub fn create_shortcut(dir: &Path, name: &str, label: &str, target: &Path) -> Result<PathBuf> {
    let path = shortcut_path(dir, name)?;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    fs::write(&path, desktop_entry(label, target, None))
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// A freedesktop `.desktop` document. With `mime_type` set the entry is hidden
/// from menus and only offered for that type.
#[cfg(not(windows))]
pub fn desktop_entry(label: &str, target: &Path, mime_type: Option<&str>) -> String {
    let mut out = String::from("[Desktop Entry]\nType=Application\n");
    out.push_str(&format!("Name={label}\n"));
    let exec = target.display().to_string().replace('"', "\\\"");
    match mime_type {
        Some(mime) => {
            out.push_str(&format!("Exec=\"{exec}\" %f\n"));
            out.push_str(&format!("MimeType={mime};\n"));
            out.push_str("NoDisplay=true\n");
        }
        None => out.push_str(&format!("Exec=\"{exec}\" %U\n")),
    }
    out.push_str("Terminal=false\n");
    out
}

pub fn remove_shortcut(dir: &Path, name: &str) -> Result<()> {
    let path = shortcut_path(dir, name)?;
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

#[cfg(windows)]
fn context_menu_key(name: &str) -> String {
    format!(r"Software\Classes\Directory\shell\{name}")
}

/// "Open with <label>" on folders.
#[cfg(windows)]
pub fn register_context_menu(
    ctx: InstallContext,
    name: &str,
    label: &str,
    target: &Path,
) -> Result<()> {
    use crate::registry::{hive, Key};

    let target = target.display().to_string();
    let verb = Key::create(hive(ctx), &context_menu_key(name))?;
    verb.set_string("", &format!("Open with {label}"))?;
    verb.set_string("Icon", &target)?;
    let command = Key::create(hive(ctx), &format!(r"{}\command", context_menu_key(name)))?;
    command.set_string("", &format!("\"{target}\" \"%1\""))
}

#[cfg(windows)]
pub fn remove_context_menu(ctx: InstallContext, name: &str) -> Result<()> {
    crate::registry::delete_tree(
        crate::registry::hive(ctx),
        r"Software\Classes\Directory\shell",
        name,
    )
}

#[cfg(not(windows))]
fn context_menu_name(name: &str) -> String {
    format!("{name}-open-folder")
}

#[cfg(not(windows))]
pub fn register_context_menu(
    ctx: InstallContext,
    name: &str,
    label: &str,
    target: &Path,
) -> Result<()> {
    register_context_menu_in(&programs_dir(ctx)?, name, label, target).map(|_| ())
}

#[cfg(not(windows))]
pub fn register_context_menu_in(
    dir: &Path,
    name: &str,
    label: &str,
    target: &Path,
) -> Result<PathBuf> {
    let path = shortcut_path(dir, &context_menu_name(name))?;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let entry = desktop_entry(&format!("Open with {label}"), target, Some("inode/directory"));
    fs::write(&path, entry).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

#[cfg(not(windows))]
pub fn remove_context_menu(ctx: InstallContext, name: &str) -> Result<()> {
    remove_shortcut(&programs_dir(ctx)?, &context_menu_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcut_path_adds_extension() {
        let base = PathBuf::from("Programs");
        let out = shortcut_path(&base, "Harbor").unwrap();
        assert_eq!(out, base.join(format!("Harbor.{SHORTCUT_EXT}")));
    }

    #[test]
    fn shortcut_path_rejects_empty_name() {
        let base = PathBuf::from("Programs");
        let err = shortcut_path(&base, "").unwrap_err();
        assert!(err.to_string().contains("shortcut name is empty"));
    }

    #[test]
    fn removing_missing_shortcut_is_fine() {
        let tmp = tempfile::tempdir().unwrap();
        remove_shortcut(tmp.path(), "Harbor").unwrap();
    }

    #[cfg(not(windows))]
    #[test]
    fn desktop_entry_for_menu() {
        let entry = desktop_entry("Harbor", Path::new("/opt/Harbor/Harbor"), None);
        assert!(entry.starts_with("[Desktop Entry]\n"));
        assert!(entry.contains("Name=Harbor\n"));
        assert!(entry.contains("Exec=\"/opt/Harbor/Harbor\" %U\n"));
        assert!(!entry.contains("NoDisplay"));
    }

    #[cfg(not(windows))]
    #[test]
    fn context_menu_entry_is_hidden_and_bound_to_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let path = register_context_menu_in(
            tmp.path(),
            "Harbor",
            "Harbor",
            Path::new("/opt/Harbor/Harbor"),
        )
        .unwrap();

        assert_eq!(path, tmp.path().join("Harbor-open-folder.desktop"));
        let entry = fs::read_to_string(path).unwrap();
        assert!(entry.contains("Name=Open with Harbor\n"));
        assert!(entry.contains("MimeType=inode/directory;\n"));
        assert!(entry.contains("NoDisplay=true\n"));
        assert!(entry.contains("%f"));
    }

    #[cfg(not(windows))]
    #[test]
    fn create_and_remove_shortcut() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("applications");
        let path = create_shortcut(&dir, "Harbor", "Harbor", Path::new("/opt/Harbor/Harbor")).unwrap();
        assert!(path.exists());

        remove_shortcut(&dir, "Harbor").unwrap();
        assert!(!path.exists());
    }
}
