//! Output sink trait
//!
//! The mixer talks to the audio device through this interface only. A sink
//! accepts fixed-size buffers of interleaved stereo 16-bit little-endian PCM
//! and may block inside `write` until the device has room; that blocking is
//! what paces the mix loop.

use super::error::AudioResult;

/// An audio output the mixer writes finished blocks to
pub trait OutputSink: Send {
    /// Open the device. Called once before the mix loop starts.
    fn open(&mut self) -> AudioResult<()>;

    /// Write one block of interleaved stereo `i16` little-endian PCM
    fn write(&mut self, pcm: &[u8]) -> AudioResult<()>;

    /// Reconfigure the device sample rate
    fn set_sample_rate(&mut self, sample_rate: u32) -> AudioResult<()>;

    /// The sample rate the device is running at
    fn sample_rate(&self) -> u32;
}
