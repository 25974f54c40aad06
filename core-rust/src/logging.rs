use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{IoContext, Result, SlipwayError};

/// Filter directives, e.g. `SLIPWAY_LOG=debug`.
pub const LOG_ENV: &str = "SLIPWAY_LOG";

/// Always writable, whatever the install scope.
pub fn logs_dir(app_name: &str) -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(app_name)
        .join("Logs")
}

/// Send `tracing` output to `<dir>/<file_name>` and to stderr.
pub fn init(dir: &Path, file_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).io_context(|| format!("create {}", dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| SlipwayError::Logging(e.to_string()))?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(appender).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| SlipwayError::Logging(e.to_string()))?;

    Ok(dir.join(file_name))
}
