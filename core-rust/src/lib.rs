//! Side-by-side version directories for a desktop application.
//!
//! An installation looks like this:
//!
//! ```text
//! Harbor/                  installation root, never renamed
//!   Harbor.exe             thin launcher
//!   uninstall.exe
//!   Versions/
//!     1.0.0/Harbor.exe     payload of one version
//!     1.1.0/Harbor.exe
//! ```
//!
//! The launcher starts the binary of the greatest version. Installs and updates
//! extract into their own version directory and then retire the others, skipping
//! any version whose process is still running.

pub mod context;
pub mod error;
pub mod fs_ops;
pub mod install;
pub mod launch;
pub mod lease;
pub mod logging;
pub mod paths;
pub mod resolve;
pub mod retire;
pub mod scan;
pub mod version;

pub use context::{InstallContext, InstallScope};
pub use error::{Result, SlipwayError};
pub use install::{install, Asset, AssetSource, DirAssets, InstallReport, ZipAssets};
pub use launch::{launch, Launched};
pub use resolve::{latest_installed, resolve};
pub use retire::{retire_all, retire_old_versions, RetireReport};
pub use scan::{scan, VersionDirectory};
pub use version::VersionId;
