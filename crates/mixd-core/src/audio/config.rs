//! Audio output configuration
//!
//! Device selection and hardware buffer settings for the output sinks.

use serde::{Deserialize, Serialize};

use crate::types::SAMPLE_RATE;

/// Largest device buffer we will request (frames)
pub const MAX_BUFFER_SIZE: u32 = 8192;

/// Default device buffer size when no preference is specified (frames)
/// 512 frames @ 44.1kHz = ~11.6ms
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Preferred buffer size for the device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Use [`DEFAULT_BUFFER_SIZE`]
    #[default]
    Default,
    /// Request a specific buffer size in frames (clamped to 64..=MAX_BUFFER_SIZE)
    Fixed(u32),
}

impl BufferSize {
    /// Get the buffer size in frames
    pub fn as_frames(&self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => (*frames).clamp(64, MAX_BUFFER_SIZE),
        }
    }

    /// Calculate latency in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.as_frames() as f32 / sample_rate as f32) * 1000.0
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, JACK, ...) so a
/// device can be selected from a specific host when several are available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "ALSA", "CoreAudio")
    /// If None, every host is searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,

    /// Hardware sample rate to open the device at
    pub sample_rate: u32,

    /// Preferred device buffer size
    pub buffer_size: BufferSize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: SAMPLE_RATE,
            buffer_size: BufferSize::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_frames() {
        assert_eq!(BufferSize::Default.as_frames(), DEFAULT_BUFFER_SIZE);
        assert_eq!(BufferSize::Fixed(256).as_frames(), 256);
        assert_eq!(BufferSize::Fixed(1).as_frames(), 64);
        assert_eq!(BufferSize::Fixed(1 << 20).as_frames(), MAX_BUFFER_SIZE);
    }

    #[test]
    fn test_device_label() {
        let mut id: DeviceId = serde_yaml::from_str("name: hw:0,0").unwrap();
        assert_eq!(id.display_label(), "hw:0,0");
        id.host = Some("ALSA".to_string());
        assert_eq!(id.display_label(), "[ALSA] hw:0,0");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AudioConfig = serde_yaml::from_str("sample_rate: 48000").unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.device, None);
        assert_eq!(config.buffer_size, BufferSize::Default);
    }
}
