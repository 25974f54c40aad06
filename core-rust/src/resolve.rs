use std::path::Path;

use crate::error::{Result, SlipwayError};
use crate::scan::{scan, VersionDirectory};

/// Pick the greatest version.
///
/// Two directory names may parse to the same version ("1.2.0" and "01.2.0");
/// which one wins is unspecified, but the choice depends only on the input: the
/// greatest path among the tied entries.
pub fn resolve(candidates: &[VersionDirectory]) -> Result<&VersionDirectory> {
    candidates
        .iter()
        .max_by(|a, b| a.version.cmp(&b.version).then_with(|| a.path.cmp(&b.path)))
        .ok_or(SlipwayError::NoVersionFound)
}

/// Scan `versions_root` and resolve the latest installed version.
pub fn latest_installed(versions_root: &Path) -> Result<VersionDirectory> {
    let candidates = scan(versions_root)?;
    resolve(&candidates).cloned()
}
