//! Audio output error types

use thiserror::Error;

/// Errors that can occur while opening, configuring or writing to an output
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to get or apply device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Stream error during playback
    #[error("Audio stream error: {0}")]
    StreamError(String),

    /// The device picked a different rate than the one requested
    #[error("Sample rate {requested}Hz not supported, device runs at {actual}Hz")]
    UnsupportedSampleRate { requested: u32, actual: u32 },

    /// Write attempted before `open` succeeded
    #[error("Audio output is not open")]
    NotOpen,

    /// Buffer is not a whole number of stereo 16-bit frames
    #[error("Buffer of {0} bytes is not a whole number of frames")]
    InvalidBufferLength(usize),

    /// WAV file output failed
    #[error("WAV output error: {0}")]
    Wav(#[from] hound::Error),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
