//! CPAL output sink
//!
//! Bridges the mixer's blocking, push-style writes to cpal's pull-style
//! device callback:
//!
//! ```text
//! ┌──────────────────┐   write()    ┌─────────────────────┐   pop()   ┌──────────────────┐
//! │   Mixer thread   │────────────►│   PCM ring (i16)    │─────────►│ cpal callback     │
//! │ (blocks if full) │              │  (lock-free SPSC)   │           │ (silence if empty)│
//! └──────────────────┘              └─────────────────────┘           └──────────────────┘
//! ```
//!
//! The ring holds only a few device buffers, so `write` blocks once the
//! device falls behind. That back-pressure is what paces the mix loop.
//!
//! `cpal::Stream` is not `Send` on every platform, so the stream is built and
//! kept alive on a dedicated thread; the sink itself only holds the ring
//! producer and a stop channel.
//!
//! Once opened, the sink keeps trying to play: a failed rate change falls
//! back to the previous rate, and `write` restarts a stream that is gone.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, StreamConfig};
use crossbeam::channel::{self, Sender};

use super::config::AudioConfig;
use super::device::{find_device_by_id, get_default_device};
use super::error::{AudioError, AudioResult};
use super::sink::OutputSink;
use crate::types::CHANNELS;

/// Number of device buffers the PCM ring can hold
const RING_BUFFERS: usize = 4;

/// How long `write` sleeps while waiting for the device to drain the ring
const WRITE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Running output stream and the thread that owns it
struct StreamThread {
    producer: rtrb::Producer<i16>,
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Output sink playing through a cpal device
pub struct CpalSink {
    config: AudioConfig,
    sample_rate: u32,
    stream: Option<StreamThread>,
    /// Set by the first successful `open`
    opened: bool,
}

impl CpalSink {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            config,
            stream: None,
            opened: false,
        }
    }

    /// Whether a device stream is currently running
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Build and start a stream at `requested_rate`, returning the actual rate
    fn start_stream(&mut self, requested_rate: u32) -> AudioResult<u32> {
        let buffer_frames = self.config.buffer_size.as_frames();
        let capacity = buffer_frames as usize * CHANNELS * RING_BUFFERS;
        let (producer, consumer) = rtrb::RingBuffer::<i16>::new(capacity);

        let (ready_tx, ready_rx) = channel::bounded::<AudioResult<u32>>(1);
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let config = self.config.clone();

        let handle = thread::Builder::new()
            .name("mixd-cpal-output".into())
            .spawn(move || {
                let (stream, actual_rate) =
                    match build_stream(&config, requested_rate, buffer_frames, consumer) {
                        Ok(built) => built,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::StreamPlayError(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(actual_rate));

                // Keep the stream alive until stopped or the sink goes away
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("cpal output stream stopped");
            })
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(actual_rate)) => {
                self.stream = Some(StreamThread {
                    producer,
                    stop_tx,
                    handle,
                });
                Ok(actual_rate)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::StreamBuildError(
                    "output thread exited before the stream started".to_string(),
                ))
            }
        }
    }

    /// Restart the stream after it was lost
    fn reopen(&mut self) -> AudioResult<()> {
        log::debug!("Restarting cpal output stream at {}Hz", self.sample_rate);
        self.sample_rate = self.start_stream(self.sample_rate)?;
        log::info!("cpal output stream restarted at {}Hz", self.sample_rate);
        Ok(())
    }

    fn stop_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream.producer);
            let _ = stream.stop_tx.send(());
            if stream.handle.join().is_err() {
                log::error!("cpal output thread panicked");
            }
        }
    }
}

impl OutputSink for CpalSink {
    fn open(&mut self) -> AudioResult<()> {
        self.stop_stream();
        let actual = self.start_stream(self.config.sample_rate)?;
        if actual != self.config.sample_rate {
            log::warn!(
                "Audio device doesn't support {}Hz, running at {}Hz",
                self.config.sample_rate,
                actual
            );
        }
        self.sample_rate = actual;
        self.opened = true;
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> AudioResult<()> {
        if self.stream.is_none() && self.opened {
            self.reopen()?;
        }
        let stream = self.stream.as_mut().ok_or(AudioError::NotOpen)?;
        if pcm.len() % (CHANNELS * 2) != 0 {
            return Err(AudioError::InvalidBufferLength(pcm.len()));
        }

        let total = pcm.len() / 2;
        let mut samples = pcm
            .chunks_exact(2)
            .map(|bytes| i16::from_le_bytes([bytes[0], bytes[1]]));
        let mut written = 0;

        while written < total {
            // Whole frames only, so the callback never splits a left/right pair
            let free = stream.producer.slots().min(total - written) & !(CHANNELS - 1);
            if free == 0 {
                if stream.producer.is_abandoned() {
                    return Err(AudioError::StreamError("output stream has stopped".to_string()));
                }
                thread::sleep(WRITE_POLL_INTERVAL);
                continue;
            }
            let chunk = stream
                .producer
                .write_chunk_uninit(free)
                .map_err(|e| AudioError::StreamError(e.to_string()))?;
            written += chunk.fill_from_iter(samples.by_ref());
        }
        Ok(())
    }

    fn set_sample_rate(&mut self, sample_rate: u32) -> AudioResult<()> {
        if self.stream.is_none() {
            self.config.sample_rate = sample_rate;
            self.sample_rate = sample_rate;
            return Ok(());
        }
        if sample_rate == self.sample_rate {
            return Ok(());
        }

        let previous = self.sample_rate;
        self.stop_stream();
        let actual = match self.start_stream(sample_rate) {
            Ok(actual) => actual,
            Err(e) => {
                log::error!("Failed to restart audio device at {}Hz: {}", sample_rate, e);
                match self.start_stream(previous) {
                    Ok(actual) => self.sample_rate = actual,
                    Err(e) => log::error!("Failed to restore audio device at {}Hz: {}", previous, e),
                }
                return Err(e);
            }
        };
        self.sample_rate = actual;
        if actual != sample_rate {
            return Err(AudioError::UnsupportedSampleRate {
                requested: sample_rate,
                actual,
            });
        }
        self.config.sample_rate = sample_rate;
        log::info!("Audio device sample rate set to {}Hz", sample_rate);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

/// Pick a device configuration and build the output stream
///
/// Runs on the output thread. Returns the stream and the sample rate it
/// actually runs at.
fn build_stream(
    config: &AudioConfig,
    requested_rate: u32,
    buffer_frames: u32,
    mut consumer: rtrb::Consumer<i16>,
) -> AudioResult<(cpal::Stream, u32)> {
    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => get_default_device()?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        requested_rate >= c.min_sample_rate().0 && requested_rate <= c.max_sample_rate().0
    };
    let best = supported
        .iter()
        .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2 && in_range(c))
        .or_else(|| {
            supported
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        })
        .ok_or_else(|| {
            AudioError::ConfigError("No stereo f32 output configuration found".to_string())
        })?;

    let sample_rate = if in_range(best) {
        cpal::SampleRate(requested_rate)
    } else {
        best.max_sample_rate()
    };

    let stream_config = StreamConfig {
        channels: best.channels(),
        sample_rate,
        buffer_size: CpalBufferSize::Fixed(buffer_frames),
    };
    let channels = stream_config.channels as usize;

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        channels,
        sample_rate.0,
        buffer_frames,
        config.buffer_size.latency_ms(sample_rate.0)
    );

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    if consumer.slots() >= CHANNELS {
                        for out in frame.iter_mut().take(CHANNELS) {
                            let sample = consumer.pop().unwrap_or(0);
                            *out = sample as f32 / i16::MAX as f32;
                        }
                        for out in frame.iter_mut().skip(CHANNELS) {
                            *out = 0.0;
                        }
                    } else {
                        // Mixer hasn't produced this frame yet: play silence
                        frame.fill(0.0);
                    }
                }
            },
            move |err| {
                log::error!("Audio output stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok((stream, sample_rate.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DeviceId;

    #[test]
    fn test_write_before_open_fails() {
        let mut sink = CpalSink::new(AudioConfig::default());
        assert!(matches!(sink.write(&[0; 4]), Err(AudioError::NotOpen)));
        assert!(!sink.is_open());
    }

    #[test]
    fn test_sample_rate_before_open_is_stored() {
        let mut sink = CpalSink::new(AudioConfig::default());
        sink.set_sample_rate(48000).unwrap();
        assert_eq!(sink.sample_rate(), 48000);
    }

    fn missing_device_config() -> AudioConfig {
        AudioConfig {
            device: Some(DeviceId {
                name: "mixd-no-such-device".to_string(),
                host: Some("NoSuchHost".to_string()),
            }),
            ..AudioConfig::default()
        }
    }

    #[test]
    fn test_write_after_lost_stream_tries_to_reopen() {
        let mut sink = CpalSink::new(missing_device_config());
        sink.opened = true;

        match sink.write(&[0; 4]) {
            Err(AudioError::DeviceNotFound(label)) => assert!(label.contains("mixd-no-such-device")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(()) => panic!("wrote to a device that should not exist"),
        }
        assert!(!sink.is_open());
    }

    #[test]
    fn test_lost_stream_reopens_at_new_rate() {
        let mut sink = CpalSink::new(missing_device_config());
        sink.opened = true;

        sink.set_sample_rate(48000).unwrap();
        assert_eq!(sink.sample_rate(), 48000);
        assert!(matches!(sink.write(&[0; 4]), Err(AudioError::DeviceNotFound(_))));
        assert_eq!(sink.sample_rate(), 48000);
    }
}
