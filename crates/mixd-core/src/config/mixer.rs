//! Mixer tuning parameters
//!
//! Loaded from YAML like every other config; any missing key falls back to
//! its default.
//!
//! ```yaml
//! block_frames: 512
//! ramp_ticks: 16
//! queue_capacity: 16384
//! settings_write_interval_ms: 2000
//! audio:
//!   device: ~
//!   sample_rate: 44100
//!   buffer_size: Default
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;

/// Frames mixed and written per cycle
pub const DEFAULT_BLOCK_FRAMES: usize = 512;

/// Configuration for [`Mixer`](crate::engine::Mixer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Frames per mix cycle
    pub block_frames: usize,
    /// Mix cycles a volume change takes to reach its target
    pub ramp_ticks: u32,
    /// Per-stream queue capacity in frames
    pub queue_capacity: usize,
    /// Delay between the first settings change and its write to disk
    pub settings_write_interval_ms: u64,
    /// Output device settings
    pub audio: AudioConfig,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            block_frames: DEFAULT_BLOCK_FRAMES,
            ramp_ticks: crate::engine::DEFAULT_RAMP_TICKS,
            queue_capacity: crate::engine::DEFAULT_QUEUE_CAPACITY,
            settings_write_interval_ms: super::DEFAULT_WRITE_INTERVAL.as_millis() as u64,
            audio: AudioConfig::default(),
        }
    }
}

impl MixerConfig {
    pub fn settings_write_interval(&self) -> Duration {
        Duration::from_millis(self.settings_write_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MixerConfig::default();
        assert_eq!(config.block_frames, 512);
        assert_eq!(config.ramp_ticks, 16);
        assert_eq!(config.settings_write_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: MixerConfig = serde_yaml::from_str("block_frames: 256\n").unwrap();
        assert_eq!(config.block_frames, 256);
        assert_eq!(config.queue_capacity, MixerConfig::default().queue_capacity);
        assert_eq!(config.audio, AudioConfig::default());
    }
}
