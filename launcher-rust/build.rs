use serde::Deserialize;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, Deserialize)]
struct Config {
    name: String,
    product_name: String,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    description: String,
    version: String,
    #[serde(default)]
    icon: String,
}

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let repo_root = PathBuf::from(manifest_dir).join("..");
    let config = load_config(&repo_root).unwrap_or_else(|err| {
        panic!("failed to load config.toml: {err}");
    });

    if targets_windows() {
        if let Err(err) = embed_resources(&repo_root, &config) {
            panic!("failed to embed resources: {err}");
        }
    }

    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR not set");
    if let Err(err) = write_config_rs(Path::new(&out_dir), &config) {
        panic!("failed to write config: {err}");
    }
}

fn targets_windows() -> bool {
    std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows")
}

fn load_config(repo_root: &Path) -> io::Result<Config> {
    let config_path = repo_root.join("config.toml");
    println!("cargo:rerun-if-changed={}", config_path.display());
    let contents = fs::read_to_string(&config_path)?;
    toml::from_str(&contents).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn embed_resources(repo_root: &Path, config: &Config) -> io::Result<()> {
    let mut res = winres::WindowsResource::new();
    if !config.icon.is_empty() {
        let icon = repo_root.join(&config.icon);
        if icon.exists() {
            res.set_icon(icon.to_string_lossy().as_ref());
        }
    }
    res.set("ProductName", &config.product_name);
    res.set("FileVersion", &config.version);
    res.set("ProductVersion", &config.version);
    if !config.description.is_empty() {
        res.set("FileDescription", &config.description);
    }
    if !config.publisher.is_empty() {
        res.set("CompanyName", &config.publisher);
    }
    res.compile()
}

fn write_config_rs(out_dir: &Path, config: &Config) -> io::Result<()> {
    let mut file = fs::File::create(out_dir.join("slipway_config.rs"))?;
    writeln!(file, "pub const NAME: &str = {:?};", config.name)?;
    writeln!(file, "pub const PRODUCT_NAME: &str = {:?};", config.product_name)?;
    writeln!(file, "pub const VERSION: &str = {:?};", config.version)?;
    Ok(())
}
