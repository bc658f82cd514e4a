use log::debug;
use std::path::{PathBuf, Path};
use std::fs;

#[cfg(target_os = "linux")]
const CONFIG_SUB_PATH: &str = ".morserelay";
#[cfg(target_os = "macos")]
const CONFIG_SUB_PATH: &str = "Library/ApplicationData/morserelay";
#[cfg(windows)]
const CONFIG_SUB_PATH: &str = "AppData\\Roaming\\morserelay";

/// The per-user directory holding the configuration file, created on first use.
pub fn configuration_directory(home_dir: Option<PathBuf>) -> Result<Box<Path>, String> {
    debug!("Home dir is {:?}", home_dir);
    let common_msg: &str = "cannot load/store configuration information.";
    let home = home_dir.ok_or_else(|| format!("No home directory found, {}", common_msg))?;
    if !home.exists() {
        return Err(format!("Home directory {:?} does not exist, {}", home, common_msg));
    }
    let config_path = home.join(CONFIG_SUB_PATH);
    debug!("Config dir is {:?}", config_path);

    if config_path.exists() {
        if !config_path.is_dir() {
            return Err(format!("Configuration directory '{:?}' is not a directory!", config_path));
        }
    } else {
        debug!("Creating config dir {:?}", config_path);
        fs::create_dir_all(config_path.as_path())
            .map_err(|err| format!("Configuration directory '{:?}' could not be created: {:?}", config_path, err))?;
    }
    Ok(config_path.into_boxed_path())
}

#[cfg(test)]
#[path = "./config_dir_spec.rs"]
mod config_dir_spec;
