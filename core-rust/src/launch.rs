use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::error::{Result, SlipwayError};
use crate::lease::{self, RunningLease};
use crate::resolve::latest_installed;
use crate::{paths, version::VersionId};

/// What [`launch`] started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launched {
    pub version: VersionId,
    pub target: PathBuf,
    pub pid: u32,
}

/// Path of the binary to start: the resolved version directory joined with the
/// launcher's own file name.
pub fn target_path(version_dir: &Path, exe_name: &str) -> PathBuf {
    version_dir.join(exe_name)
}

/// Start the latest installed version of `exe_name` with `args` and return
/// without waiting for it.
pub fn launch(installation_root: &Path, exe_name: &str, args: &[OsString]) -> Result<Launched> {
    launch_with(installation_root, exe_name, args, |cmd| {
        cmd.spawn().map(|child| child.id())
    })
}

/// Same as [`launch`] with the process creation supplied by the caller.
pub fn launch_with(
    installation_root: &Path,
    exe_name: &str,
    args: &[OsString],
    spawn: impl FnOnce(&mut Command) -> io::Result<u32>,
) -> Result<Launched> {
    let versions_root = paths::versions_root(installation_root);
    let latest = latest_installed(&versions_root)?;
    let target = target_path(&latest.path, exe_name);
    if !target.is_file() {
        return Err(SlipwayError::TargetMissing(target));
    }

    lease::release_inherited();
    // Held until the child has inherited it
    #[cfg_attr(not(unix), allow(unused_variables))]
    let lease = match RunningLease::acquire(&latest.path) {
        Ok(lease) => Some(lease),
        Err(err) => {
            tracing::warn!("launching {} without a lease: {err}", latest.version);
            None
        }
    };
    // A retirement that held the version while we waited has removed it
    if !target.is_file() {
        return Err(SlipwayError::TargetMissing(target));
    }

    let mut cmd = Command::new(&target);
    cmd.args(args)
        .current_dir(&latest.path)
        .stdin(Stdio::null())
        .env_remove(lease::LEASE_FD_ENV);
    #[cfg(unix)]
    {
        if let Some(lease) = &lease {
            cmd.env(lease::LEASE_FD_ENV, lease.raw_fd().to_string());
        }
    }
    let pid = spawn(&mut cmd).map_err(|source| SlipwayError::Spawn {
        path: target.clone(),
        source,
    })?;
    tracing::info!("started {} (pid {pid})", target.display());

    Ok(Launched {
        version: latest.version,
        target,
        pid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn recording_spawn(
        seen: &mut Vec<(PathBuf, Vec<OsString>)>,
    ) -> impl FnOnce(&mut Command) -> io::Result<u32> + '_ {
        move |cmd| {
            seen.push((
                PathBuf::from(cmd.get_program()),
                cmd.get_args().map(|a| a.to_os_string()).collect(),
            ));
            Ok(4242)
        }
    }

    #[test]
    fn launches_latest_with_forwarded_args() {
        let tmp = tempfile::tempdir().unwrap();
        let versions = tmp.path().join("Versions");
        for v in ["1.0.0", "1.10.0", "1.9.3"] {
            fs::create_dir_all(versions.join(v)).unwrap();
            fs::write(versions.join(v).join("app.exe"), "exe").unwrap();
        }
        let args = vec![OsString::from("--open"), OsString::from("a b.txt")];

        let mut seen = Vec::new();
        let launched =
            launch_with(tmp.path(), "app.exe", &args, recording_spawn(&mut seen)).unwrap();

        let expected = versions.join("1.10.0").join("app.exe");
        assert_eq!(launched.version, VersionId::new(1, 10, 0));
        assert_eq!(launched.target, expected);
        assert_eq!(launched.pid, 4242);
        assert_eq!(seen, vec![(expected, args)]);
    }

    #[test]
    fn empty_versions_root_aborts_launch() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("Versions")).unwrap();

        let mut seen = Vec::new();
        let err =
            launch_with(tmp.path(), "app.exe", &[], recording_spawn(&mut seen)).unwrap_err();

        assert!(matches!(err, SlipwayError::NoVersionFound));
        assert!(seen.is_empty());
    }

    #[test]
    fn missing_versions_root_aborts_launch() {
        let tmp = tempfile::tempdir().unwrap();
        let err = launch_with(tmp.path(), "app.exe", &[], |_| Ok(1)).unwrap_err();
        assert!(matches!(err, SlipwayError::VersionsRootUnreadable { .. }));
    }

    #[test]
    fn missing_binary_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("Versions").join("1.0.0")).unwrap();
        let err = launch_with(tmp.path(), "app.exe", &[], |_| Ok(1)).unwrap_err();
        assert!(matches!(err, SlipwayError::TargetMissing(_)));
    }

    #[test]
    fn child_learns_its_lease_descriptor() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Versions").join("1.0.0");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("app.exe"), "exe").unwrap();

        let mut lease_env = None;
        launch_with(tmp.path(), "app.exe", &[], |cmd| {
            lease_env = cmd
                .get_envs()
                .find(|(key, _)| *key == lease::LEASE_FD_ENV)
                .map(|(_, value)| value.map(|v| v.to_os_string()));
            Ok(1)
        })
        .unwrap();

        let lease_env = lease_env.expect("lease variable is set or removed");
        if cfg!(unix) {
            let fd: i32 = lease_env.unwrap().to_str().unwrap().parse().unwrap();
            assert!(fd > 2);
        } else {
            assert!(lease_env.is_none());
        }
    }

    #[cfg(unix)]
    #[test]
    fn launch_racing_a_retirement_fails_visibly() {
        use std::{thread, time::Duration};

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Versions").join("1.0.0");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("app.exe"), "exe").unwrap();
        lease::prepare(&dir).unwrap();

        let guard = lease::try_lock_idle(&dir).unwrap().expect("idle");
        let root = tmp.path().to_path_buf();
        let launcher = thread::spawn(move || launch_with(&root, "app.exe", &[], |_| Ok(1)));

        thread::sleep(Duration::from_millis(100));
        fs::remove_file(dir.join("app.exe")).unwrap();
        drop(guard);

        let err = launcher.join().unwrap().unwrap_err();
        assert!(matches!(err, SlipwayError::TargetMissing(_)));
    }

    #[test]
    fn spawn_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Versions").join("1.0.0");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("app.exe"), "exe").unwrap();

        let err = launch_with(tmp.path(), "app.exe", &[], |_| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        })
        .unwrap_err();
        assert!(matches!(err, SlipwayError::Spawn { .. }));
    }
}
