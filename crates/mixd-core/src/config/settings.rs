//! Persisted master volume and mute settings
//!
//! Stored as YAML:
//!
//! ```yaml
//! Master:
//!   Volume: 100   # integer percent, 0-200
//!   Mute: false
//! ```
//!
//! Missing or malformed files fall back to 100% volume, unmuted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::io::{load_config, save_config};
use super::paths::{default_config_path, SETTINGS_FILE};
use crate::engine::{clamp_volume, MAX_VOLUME};

/// The `Master` section of the settings file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterSettings {
    /// Master volume in percent (0-200)
    #[serde(rename = "Volume")]
    pub volume: u32,
    #[serde(rename = "Mute")]
    pub mute: bool,
}

impl Default for MasterSettings {
    fn default() -> Self {
        Self {
            volume: 100,
            mute: false,
        }
    }
}

/// Settings persisted across server restarts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerSettings {
    #[serde(rename = "Master")]
    pub master: MasterSettings,
}

impl MixerSettings {
    /// Master volume as a mixer position (0.0 to 2.0)
    pub fn volume(&self) -> f32 {
        clamp_volume(self.master.volume as f32 / 100.0)
    }

    /// Store a mixer volume position as an integer percentage
    pub fn set_volume(&mut self, volume: f32) {
        let percent = (clamp_volume(volume) * 100.0).round() as u32;
        self.master.volume = percent.min((MAX_VOLUME * 100.0) as u32);
    }

    pub fn muted(&self) -> bool {
        self.master.mute
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.master.mute = muted;
    }
}

/// Durable storage for [`MixerSettings`]
pub trait SettingsStore: Send + Sync {
    /// Read the stored settings, falling back to defaults on any problem
    fn load(&self) -> MixerSettings;

    /// Write the settings
    fn save(&self, settings: &MixerSettings) -> anyhow::Result<()>;
}

/// Settings stored in a YAML file
#[derive(Debug, Clone)]
pub struct YamlSettingsStore {
    path: PathBuf,
}

impl YamlSettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store at the default location (`~/.config/mixd/mixer.yaml`)
    pub fn default_location() -> Self {
        Self::new(default_config_path(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for YamlSettingsStore {
    fn load(&self) -> MixerSettings {
        load_config(&self.path)
    }

    fn save(&self, settings: &MixerSettings) -> anyhow::Result<()> {
        save_config(settings, &self.path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{MixerSettings, SettingsStore};
    use std::sync::Mutex;

    /// In-memory store that records every write
    #[derive(Default)]
    pub struct MemoryStore {
        pub initial: MixerSettings,
        pub fail: bool,
        writes: Mutex<Vec<MixerSettings>>,
        attempts: Mutex<usize>,
    }

    impl MemoryStore {
        pub fn with_settings(initial: MixerSettings) -> Self {
            Self {
                initial,
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn writes(&self) -> Vec<MixerSettings> {
            self.writes.lock().unwrap().clone()
        }

        pub fn attempts(&self) -> usize {
            *self.attempts.lock().unwrap()
        }
    }

    impl SettingsStore for MemoryStore {
        fn load(&self) -> MixerSettings {
            self.initial.clone()
        }

        fn save(&self, settings: &MixerSettings) -> anyhow::Result<()> {
            *self.attempts.lock().unwrap() += 1;
            if self.fail {
                anyhow::bail!("disk full");
            }
            self.writes.lock().unwrap().push(settings.clone());
            Ok(())
        }
    }
}
