//! mixd core - real-time audio mixing server engine
//!
//! Many client connections each push a stream of stereo samples; one mixer
//! thread sums them, applies per-stream and master volume, and writes 16-bit
//! PCM blocks to an output device.

pub mod audio;
pub mod config;
pub mod engine;
pub mod types;

pub use types::*;
