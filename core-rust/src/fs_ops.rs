use std::{
    fs,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{IoContext, Result, SlipwayError};

fn temp_path_for(dest: &Path) -> Result<PathBuf> {
    let parent = dest
        .parent()
        .ok_or_else(|| SlipwayError::InvalidAssetPath(dest.display().to_string()))?;
    let name = dest
        .file_name()
        .ok_or_else(|| SlipwayError::InvalidAssetPath(dest.display().to_string()))?
        .to_string_lossy();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::from_millis(0))
        .as_nanos();
    Ok(parent.join(format!("{name}.tmp-{nonce}")))
}

/// True when `path` is a regular file holding exactly `bytes`.
pub fn has_contents(path: &Path, bytes: &[u8]) -> Result<bool> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err).io_context(|| format!("metadata {}", path.display())),
    };
    if !meta.is_file() || meta.len() != bytes.len() as u64 {
        return Ok(false);
    }
    let existing = fs::read(path).io_context(|| format!("read {}", path.display()))?;
    Ok(existing == bytes)
}

/// Write `bytes` to a sibling temp file, then rename it over `dest`.
///
/// On Unix the file is made executable (0755), matching how payload files are
/// laid out by the installer.
pub fn write_bytes_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path_for(dest)?;
    fs::write(&tmp, bytes).io_context(|| format!("write {}", tmp.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o755))
            .io_context(|| format!("chmod {}", tmp.display()))?;
    }
    // Unix rename replaces `dest` in one step; Windows refuses an existing target
    #[cfg(windows)]
    {
        if dest.exists() {
            if let Err(err) = fs::remove_file(dest) {
                let _ = fs::remove_file(&tmp);
                return Err(err).io_context(|| format!("remove {}", dest.display()));
            }
        }
    }
    if let Err(err) = fs::rename(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(err).io_context(|| format!("rename {} -> {}", tmp.display(), dest.display()));
    }
    Ok(())
}

/// Write `bytes` unless `dest` already holds them. Returns whether it wrote.
pub fn write_if_changed(dest: &Path, bytes: &[u8]) -> Result<bool> {
    if has_contents(dest, bytes)? {
        return Ok(false);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).io_context(|| format!("create {}", parent.display()))?;
    }
    write_bytes_atomic(dest, bytes)?;
    Ok(true)
}

/// Copy `src` to `dest` unless they already match. Returns whether it wrote.
pub fn copy_if_changed(src: &Path, dest: &Path) -> Result<bool> {
    if src == dest {
        return Ok(false);
    }
    let bytes = fs::read(src).io_context(|| format!("read {}", src.display()))?;
    write_if_changed(dest, &bytes)
}

/// Remove `dir` when it exists and is empty. Returns whether it was removed.
pub fn remove_dir_if_empty(dir: &Path) -> Result<bool> {
    let mut entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err).io_context(|| format!("read {}", dir.display())),
    };
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir).io_context(|| format!("remove {}", dir.display()))?;
    Ok(true)
}
