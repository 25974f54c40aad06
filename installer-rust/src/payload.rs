use anyhow::{bail, Context, Result};
use slipway_core::ZipAssets;
use std::io::Cursor;

const EMBEDDED_PAYLOAD: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/app_payload.zip"));
const EMBEDDED_LAUNCHER: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/launcher.bin"));
const EMBEDDED_UPDATER: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/updater.bin"));

pub fn assets() -> Result<ZipAssets<Cursor<&'static [u8]>>> {
    if EMBEDDED_PAYLOAD.is_empty() {
        bail!("embedded payload is empty");
    }
    ZipAssets::new(Cursor::new(EMBEDDED_PAYLOAD)).context("read embedded zip")
}

pub fn launcher() -> Result<&'static [u8]> {
    if EMBEDDED_LAUNCHER.is_empty() {
        bail!("embedded launcher is empty");
    }
    Ok(EMBEDDED_LAUNCHER)
}

/// Builds without an updater install none.
pub fn updater() -> Option<&'static [u8]> {
    (!EMBEDDED_UPDATER.is_empty()).then_some(EMBEDDED_UPDATER)
}
