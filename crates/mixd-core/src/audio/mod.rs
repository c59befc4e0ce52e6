//! Audio output for mixd
//!
//! The mixer writes finished blocks of interleaved stereo 16-bit PCM to an
//! [`OutputSink`]. Two sinks are provided:
//!
//! - [`CpalSink`]: a hardware device through cpal (ALSA, CoreAudio, WASAPI)
//! - [`WavSink`]: a WAV file, optionally paced to real time
//!
//! # Example Usage
//!
//! ```ignore
//! use mixd_core::audio::{AudioConfig, CpalSink, DeviceId};
//!
//! let config = AudioConfig {
//!     device: Some(DeviceId { name: "hw:0,0".into(), host: Some("ALSA".into()) }),
//!     ..AudioConfig::default()
//! };
//! let sink = CpalSink::new(config);
//! // Hand the sink to the mixer, which opens it and starts writing blocks
//! ```

mod config;
mod cpal_sink;
mod device;
mod error;
mod sink;
mod wav_sink;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
pub use cpal_sink::CpalSink;
pub use device::{find_device_by_id, get_default_device};
pub use error::{AudioError, AudioResult};
pub use sink::OutputSink;
pub use wav_sink::WavSink;
