//! Running-version lease.
//!
//! Windows refuses to delete the image of a running executable, which is what
//! retirement relies on. Unix happily unlinks it, so there the launcher holds a
//! shared `flock` on `<version dir>/.running.lock` through a descriptor that the
//! launched process inherits. The lock is released when the last process holding
//! that descriptor exits. Retirement takes a non-blocking exclusive lock and keeps
//! it until the directory is gone.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{IoContext, Result};

pub const LEASE_FILE_NAME: &str = ".running.lock";

pub fn lease_path(version_dir: &Path) -> PathBuf {
    version_dir.join(LEASE_FILE_NAME)
}

/// Create the (empty) lease file so that unprivileged processes can lock it later,
/// even when the version directory itself is read-only to them.
pub fn prepare(version_dir: &Path) -> Result<()> {
    let path = lease_path(version_dir);
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .io_context(|| format!("create {}", path.display()))?;
    Ok(())
}

/// Environment variable through which a launched process learns the descriptor
/// number of the lease it inherited.
pub const LEASE_FD_ENV: &str = "SLIPWAY_LEASE_FD";

/// A shared lock marking a version as in use.
#[derive(Debug)]
pub struct RunningLease {
    #[cfg(unix)]
    file: fs::File,
}

impl RunningLease {
    /// Lock `version_dir` as running. On Unix the descriptor is left inheritable so
    /// that the next spawned child keeps the lock after this process exits.
    #[cfg(unix)]
    pub fn acquire(version_dir: &Path) -> Result<Self> {
        use std::os::unix::io::AsRawFd;

        let path = lease_path(version_dir);
        let file = open_or_create(&path)?;

        let fd = file.as_raw_fd();
        // Blocks while a retirer holds the version
        let rc = unsafe { libc::flock(fd, libc::LOCK_SH) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error())
                .io_context(|| format!("lock {}", path.display()));
        }
        set_cloexec(fd, false).io_context(|| format!("fcntl {}", path.display()))?;

        Ok(Self { file })
    }

    #[cfg(not(unix))]
    pub fn acquire(_version_dir: &Path) -> Result<Self> {
        Ok(Self {})
    }

    /// Descriptor number a child sees the lease under.
    #[cfg(unix)]
    pub fn raw_fd(&self) -> std::os::unix::io::RawFd {
        use std::os::unix::io::AsRawFd;
        self.file.as_raw_fd()
    }
}

#[cfg(unix)]
fn open_or_create(path: &Path) -> Result<fs::File> {
    match fs::File::open(path) {
        Ok(file) => Ok(file),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .io_context(|| format!("create {}", path.display())),
        Err(err) => Err(err).io_context(|| format!("open {}", path.display())),
    }
}

#[cfg(unix)]
fn set_cloexec(fd: std::os::unix::io::RawFd, on: bool) -> std::io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    let flags = if on {
        flags | libc::FD_CLOEXEC
    } else {
        flags & !libc::FD_CLOEXEC
    };
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Stop handing the lease this process inherited (named by [`LEASE_FD_ENV`]) to
/// its own children. A launcher started by a running version would otherwise pin
/// that version for as long as anything it starts keeps running.
#[cfg(unix)]
pub fn release_inherited() {
    let Some(fd) = std::env::var(LEASE_FD_ENV)
        .ok()
        .and_then(|value| value.trim().parse::<std::os::unix::io::RawFd>().ok())
    else {
        return;
    };
    // Closed already, or never inherited
    if let Err(err) = set_cloexec(fd, true) {
        tracing::debug!("inherited lease fd {fd} not usable: {err}");
    }
}

#[cfg(not(unix))]
pub fn release_inherited() {}

/// Exclusive hold on an idle version, taken by the retirer for the whole
/// deletion. A launcher that resolved the same version meanwhile blocks in
/// [`RunningLease::acquire`] and then finds its target gone.
#[derive(Debug)]
pub struct IdleGuard {
    #[cfg(unix)]
    _file: Option<fs::File>,
}

/// `None` when some process holds the lease of `version_dir`.
#[cfg(unix)]
pub fn try_lock_idle(version_dir: &Path) -> Result<Option<IdleGuard>> {
    use std::os::unix::io::AsRawFd;

    let path = lease_path(version_dir);
    let file = match fs::File::open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Some(IdleGuard { _file: None }))
        }
        Err(err) => return Err(err).io_context(|| format!("open {}", path.display())),
    };

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::WouldBlock {
            return Ok(None);
        }
        return Err(err).io_context(|| format!("lock {}", path.display()));
    }
    Ok(Some(IdleGuard { _file: Some(file) }))
}

/// Windows signals a running version through the failed delete of its executable.
#[cfg(not(unix))]
pub fn try_lock_idle(_version_dir: &Path) -> Result<Option<IdleGuard>> {
    Ok(Some(IdleGuard {}))
}

/// Whether some process holds the lease of `version_dir`.
pub fn is_in_use(version_dir: &Path) -> Result<bool> {
    Ok(try_lock_idle(version_dir)?.is_none())
}
