//! Minimal writer for the 32-bit registry view.

use std::{ffi::OsStr, io, iter::once, os::windows::ffi::OsStrExt, ptr};

use anyhow::{Context, Result};
use slipway_core::InstallContext;
use windows_sys::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS};
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegDeleteTreeW, RegOpenKeyExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_ALL_ACCESS, KEY_WOW64_32KEY, KEY_WRITE,
    REG_OPTION_NON_VOLATILE, REG_SZ,
};

fn wide(value: &str) -> Vec<u16> {
    OsStr::new(value).encode_wide().chain(once(0)).collect()
}

fn check(status: u32, what: impl FnOnce() -> String) -> Result<()> {
    if status == ERROR_SUCCESS {
        return Ok(());
    }
    Err(io::Error::from_raw_os_error(status as i32)).with_context(what)
}

/// HKCU for per-user installs, HKLM otherwise.
pub fn hive(ctx: InstallContext) -> HKEY {
    if ctx.is_per_user() {
        HKEY_CURRENT_USER
    } else {
        HKEY_LOCAL_MACHINE
    }
}

pub struct Key {
    handle: HKEY,
    path: String,
}

impl Key {
    pub fn create(hive: HKEY, path: &str) -> Result<Self> {
        let mut handle: HKEY = 0;
        let status = unsafe {
            RegCreateKeyExW(
                hive,
                wide(path).as_ptr(),
                0,
                ptr::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_WRITE | KEY_WOW64_32KEY,
                ptr::null(),
                &mut handle,
                ptr::null_mut(),
            )
        };
        check(status, || format!("create registry key {path}"))?;
        Ok(Self {
            handle,
            path: path.to_string(),
        })
    }

    /// Write a `REG_SZ` value; an empty `name` is the key's default value.
    pub fn set_string(&self, name: &str, value: &str) -> Result<()> {
        let data = wide(value);
        let status = unsafe {
            RegSetValueExW(
                self.handle,
                wide(name).as_ptr(),
                0,
                REG_SZ,
                data.as_ptr().cast(),
                (data.len() * 2) as u32,
            )
        };
        check(status, || format!("set {}\\{name}", self.path))
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        unsafe { RegCloseKey(self.handle) };
    }
}

/// Remove `parent\leaf` and everything below it. A missing key is not an error.
pub fn delete_tree(hive: HKEY, parent: &str, leaf: &str) -> Result<()> {
    let mut handle: HKEY = 0;
    let status = unsafe {
        RegOpenKeyExW(
            hive,
            wide(parent).as_ptr(),
            0,
            KEY_ALL_ACCESS | KEY_WOW64_32KEY,
            &mut handle,
        )
    };
    if status == ERROR_FILE_NOT_FOUND {
        return Ok(());
    }
    check(status, || format!("open registry key {parent}"))?;
    let parent_key = Key {
        handle,
        path: parent.to_string(),
    };

    let status = unsafe { RegDeleteTreeW(parent_key.handle, wide(leaf).as_ptr()) };
    if status == ERROR_FILE_NOT_FOUND {
        return Ok(());
    }
    check(status, || format!("delete registry key {parent}\\{leaf}"))
}
