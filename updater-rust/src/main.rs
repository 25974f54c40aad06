mod config;
mod updater;

use anyhow::Result;
use slipway_core::logging;

/// Tells the launcher that setup has applied an update.
const EXIT_UPDATED: i32 = 10;

fn main() -> Result<()> {
    if let Err(err) = logging::init(&logging::logs_dir(config::NAME), "updater.log") {
        eprintln!("warning: logging disabled: {err}");
    }

    match updater::run() {
        updater::UpdateOutcome::Updated => std::process::exit(EXIT_UPDATED),
        updater::UpdateOutcome::NoUpdate => Ok(()),
    }
}
