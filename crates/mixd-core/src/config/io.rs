//! Generic configuration I/O utilities
//!
//! YAML loading and saving for any serializable configuration type.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    log::debug!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("load_config: Failed to parse {:?}: {}, using defaults", path, e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: Failed to read {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist. The YAML is written to a
/// sibling `.yaml.tmp` file and renamed over `path`.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", tmp_path))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move config into place: {:?}", path))?;

    log::debug!("save_config: Saved {:?}", path);
    Ok(())
}
