use serde::Deserialize;
use std::{
    fs::{self, File},
    io::{self, Read, Write},
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
    product_id: String,
    install_dir_name: String,
    #[serde(default)]
    icon: String,
    #[serde(default = "default_payload_dir")]
    payload_dir: String,
}

fn default_payload_dir() -> String {
    "payload".to_string()
}

fn main() {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR not set"));
    let manifest_dir = PathBuf::from(
        std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"),
    );
    let repo_root = manifest_dir.join("..");
    let config = load_config(&repo_root).unwrap_or_else(|err| {
        panic!("failed to load config.toml: {err}");
    });

    let payload_dir = repo_root.join(&config.payload_dir);
    println!("cargo:rerun-if-changed={}", payload_dir.display());
    if let Err(err) = write_payload_zip(&payload_dir, &out_dir.join("app_payload.zip")) {
        panic!("failed to build payload zip: {err}");
    }

    let launcher_name = format!("launcher{}", exe_suffix());
    let launcher = manifest_dir.join("embedded").join(&launcher_name);
    println!("cargo:rerun-if-changed={}", launcher.display());
    if let Err(err) = stage_binary(&launcher, &out_dir.join("launcher.bin")) {
        panic!("failed to stage launcher: {err}");
    }

    let updater = manifest_dir.join("embedded").join(format!("updater{}", exe_suffix()));
    println!("cargo:rerun-if-changed={}", updater.display());
    if let Err(err) = stage_binary(&updater, &out_dir.join("updater.bin")) {
        panic!("failed to stage updater: {err}");
    }

    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows") {
        if let Err(err) = embed_resources(&repo_root, &config) {
            panic!("failed to embed resources: {err}");
        }
    }

    if let Err(err) = write_config_rs(&out_dir, &config) {
        panic!("failed to write config: {err}");
    }
}

fn exe_suffix() -> &'static str {
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows") {
        ".exe"
    } else {
        ""
    }
}

fn load_config(repo_root: &Path) -> io::Result<Config> {
    let config_path = repo_root.join("config.toml");
    println!("cargo:rerun-if-changed={}", config_path.display());
    let contents = fs::read_to_string(&config_path)?;
    toml::from_str(&contents).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

// A missing payload produces an empty file; setup refuses to run with it.
fn write_payload_zip(payload_dir: &Path, out_path: &Path) -> io::Result<()> {
    if !payload_dir.is_dir() {
        println!(
            "cargo:warning=payload directory {} not found, embedding an empty payload",
            payload_dir.display()
        );
        File::create(out_path)?;
        return Ok(());
    }

    let file = File::create(out_path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default().unix_permissions(0o755);
    add_dir_recursive(payload_dir, payload_dir, &mut zip, options)?;
    zip.finish()?;
    Ok(())
}

fn add_dir_recursive(
    root: &Path,
    dir: &Path,
    zip: &mut zip::ZipWriter<File>,
    options: zip::write::FileOptions,
) -> io::Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<_>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            add_dir_recursive(root, &path, zip, options)?;
        } else if path.is_file() {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            let name = rel.to_string_lossy().replace('\\', "/");
            zip.start_file(name, options)?;
            let mut buf = Vec::new();
            File::open(&path)?.read_to_end(&mut buf)?;
            zip.write_all(&buf)?;
        }
    }
    Ok(())
}

// Staged empty when missing: setup refuses an empty launcher and skips an empty updater
fn stage_binary(src: &Path, dest: &Path) -> io::Result<()> {
    if src.is_file() {
        fs::copy(src, dest)?;
    } else {
        println!(
            "cargo:warning={} not found, embedding an empty file",
            src.display()
        );
        File::create(dest)?;
    }
    Ok(())
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
    res.set("InternalName", &format!("{}-setup", config.name));
    if !config.description.is_empty() {
        res.set("FileDescription", &config.description);
    }
    if !config.publisher.is_empty() {
        res.set("CompanyName", &config.publisher);
    }
    res.compile()
}

fn write_config_rs(out_dir: &Path, config: &Config) -> io::Result<()> {
    let mut file = File::create(out_dir.join("slipway_config.rs"))?;
    writeln!(file, "pub const NAME: &str = {:?};", config.name)?;
    writeln!(file, "pub const PRODUCT_NAME: &str = {:?};", config.product_name)?;
    writeln!(file, "pub const PUBLISHER: &str = {:?};", config.publisher)?;
    writeln!(file, "pub const VERSION: &str = {:?};", config.version)?;
    writeln!(file, "pub const PRODUCT_ID: &str = {:?};", config.product_id)?;
    writeln!(file, "pub const INSTALL_DIR_NAME: &str = {:?};", config.install_dir_name)?;
    Ok(())
}
