//! Error types for the core crate

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlipwayError {
    #[error("invalid version {input:?}: {reason}")]
    InvalidVersion { input: String, reason: &'static str },

    #[error("cannot read versions root {}: {source}", path.display())]
    VersionsRootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("versions root {} is not a directory", .0.display())]
    VersionsRootNotADirectory(PathBuf),

    #[error("no installed version found")]
    NoVersionFound,

    #[error("target binary not found at {}", .0.display())]
    TargetMissing(PathBuf),

    #[error("failed to start {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid asset path {0:?}")]
    InvalidAssetPath(String),

    #[error("asset archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("no directory named {sentinel:?} above {}", start.display())]
    InstallationRootNotFound { start: PathBuf, sentinel: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, SlipwayError>;

/// Attaches a short description of the failed operation to an I/O error.
pub trait IoContext<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| SlipwayError::Io {
            context: f(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_context_keeps_message_and_source() {
        let res: io::Result<()> = Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = res.io_context(|| "create /tmp/x".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "create /tmp/x: gone");
        assert!(std::error::Error::source(&err).is_some());
    }
}
