use serde::Deserialize;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, Deserialize)]
struct Config {
    name: String,
    install_dir_name: String,
    #[serde(default)]
    auto_update_enabled: bool,
    #[serde(default)]
    update_manifest_url: String,
}

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let repo_root = PathBuf::from(manifest_dir).join("..");
    let config = load_config(&repo_root).unwrap_or_else(|err| {
        panic!("failed to load config.toml: {err}");
    });

    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR not set");
    if let Err(err) = write_config_rs(Path::new(&out_dir), &config) {
        panic!("failed to write config: {err}");
    }
}

fn load_config(repo_root: &Path) -> io::Result<Config> {
    let config_path = repo_root.join("config.toml");
    println!("cargo:rerun-if-changed={}", config_path.display());
    let contents = fs::read_to_string(&config_path)?;
    toml::from_str(&contents).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn write_config_rs(out_dir: &Path, config: &Config) -> io::Result<()> {
    let mut file = fs::File::create(out_dir.join("slipway_config.rs"))?;
    writeln!(file, "pub const NAME: &str = {:?};", config.name)?;
    writeln!(file, "pub const INSTALL_DIR_NAME: &str = {:?};", config.install_dir_name)?;
    writeln!(
        file,
        "pub const AUTO_UPDATE_ENABLED: bool = {:?};",
        config.auto_update_enabled
    )?;
    writeln!(
        file,
        "pub const UPDATE_MANIFEST_URL: &str = {:?};",
        config.update_manifest_url
    )?;
    Ok(())
}
