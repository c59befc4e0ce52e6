//! Mixing engine - client streams, volume envelopes and the mixer thread
//!
//! - [`Mixer`]: owns the mixer thread, master volume/mute and the output sink
//! - [`StreamHandle`] / [`ClientAudioStream`]: the two halves of a client stream
//! - [`VolumeEnvelope`]: click-free gain ramps on a per-block time base
//! - [`MixCycle`]: the per-block mixing work

mod client;
mod cycle;
mod envelope;
mod membership;
mod mixer;
mod stream;

pub use client::{ClientRegistry, MixerClient};
pub use cycle::{MixCycle, SAMPLE_HEADROOM, SILENCE_THRESHOLD};
pub use envelope::{clamp_volume, VolumeControl, VolumeEnvelope, DEFAULT_RAMP_TICKS, MAX_VOLUME, MIN_VOLUME};
pub use mixer::Mixer;
pub use stream::{ClientAudioStream, StreamHandle, StreamId, DEFAULT_QUEUE_CAPACITY};
