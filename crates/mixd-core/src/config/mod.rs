//! Configuration for mixd
//!
//! - Generic YAML config loading/saving
//! - Config path utilities
//! - Persisted master volume/mute settings and their debounced writer
//! - Mixer tuning parameters
//!
//! # Usage
//!
//! ```ignore
//! use mixd_core::config::{load_config, MixerConfig, SettingsSync, YamlSettingsStore};
//!
//! let config: MixerConfig = load_config(&config_path);
//! let store = Arc::new(YamlSettingsStore::default_location());
//! let sync = SettingsSync::spawn(store.clone(), store.load(), config.settings_write_interval());
//! ```

mod io;
mod mixer;
mod paths;
mod settings;
mod sync;

pub use io::{load_config, save_config};
pub use mixer::{MixerConfig, DEFAULT_BLOCK_FRAMES};
pub use paths::{default_config_dir, default_config_path, SETTINGS_FILE};
pub use settings::{MasterSettings, MixerSettings, SettingsStore, YamlSettingsStore};
pub use sync::{SettingsSync, DEFAULT_WRITE_INTERVAL};

#[cfg(test)]
pub(crate) use settings::testing;
