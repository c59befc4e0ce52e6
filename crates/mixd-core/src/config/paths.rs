//! Path utilities for mixd configuration files

use std::path::PathBuf;

/// File name of the persisted master volume/mute settings
pub const SETTINGS_FILE: &str = "mixer.yaml";

/// Get the mixd configuration directory
///
/// Returns: `$XDG_CONFIG_HOME/mixd` (usually `~/.config/mixd`), or `./mixd`
/// when no config directory can be determined.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mixd")
}

/// Get the default path for a configuration file
///
/// # Arguments
/// * `filename` - Config file name (e.g., "mixer.yaml")
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_mixd() {
        assert!(default_config_dir().ends_with("mixd"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path(SETTINGS_FILE);
        assert!(path.ends_with("mixd/mixer.yaml"));
    }
}
