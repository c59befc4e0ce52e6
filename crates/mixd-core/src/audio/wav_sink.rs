//! WAV file output sink
//!
//! Records the mixer output to a 16-bit stereo WAV file. Useful for headless
//! machines and for capturing exactly what the mixer produced. With real-time
//! pacing enabled, `write` sleeps so blocks leave at the sample rate, the same
//! cadence a hardware device would impose.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::error::{AudioError, AudioResult};
use super::sink::OutputSink;
use crate::types::{BYTES_PER_FRAME, CHANNELS, SAMPLE_RATE};

/// Output sink writing to a WAV file
pub struct WavSink {
    path: PathBuf,
    sample_rate: u32,
    realtime: bool,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    frames_written: u64,
    started: Instant,
}

impl WavSink {
    /// Create a sink writing to `path` at the default sample rate
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sample_rate: SAMPLE_RATE,
            realtime: false,
            writer: None,
            frames_written: 0,
            started: Instant::now(),
        }
    }

    /// Pace writes to real time instead of writing as fast as possible
    pub fn with_realtime_pacing(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Number of frames written since `open`
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Flush the header and close the file
    pub fn finalize(&mut self) -> AudioResult<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            log::info!(
                "Finished WAV recording {:?} ({} frames)",
                self.path,
                self.frames_written
            );
        }
        Ok(())
    }

    fn pace(&self) {
        let due = Duration::from_secs_f64(self.frames_written as f64 / self.sample_rate as f64);
        let elapsed = self.started.elapsed();
        if due > elapsed {
            thread::sleep(due - elapsed);
        }
    }
}

impl OutputSink for WavSink {
    fn open(&mut self) -> AudioResult<()> {
        self.finalize()?;

        let spec = hound::WavSpec {
            channels: CHANNELS as u16,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        self.writer = Some(hound::WavWriter::create(&self.path, spec)?);
        self.frames_written = 0;
        self.started = Instant::now();

        log::info!("Recording mixer output to {:?} at {}Hz", self.path, self.sample_rate);
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> AudioResult<()> {
        if pcm.len() % BYTES_PER_FRAME != 0 {
            return Err(AudioError::InvalidBufferLength(pcm.len()));
        }
        let writer = self.writer.as_mut().ok_or(AudioError::NotOpen)?;

        for bytes in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([bytes[0], bytes[1]]))?;
        }
        self.frames_written += (pcm.len() / BYTES_PER_FRAME) as u64;

        if self.realtime {
            self.pace();
        }
        Ok(())
    }

    fn set_sample_rate(&mut self, sample_rate: u32) -> AudioResult<()> {
        if self.writer.is_some() && sample_rate != self.sample_rate {
            return Err(AudioError::ConfigError(
                "sample rate is fixed once the WAV header is written".to_string(),
            ));
        }
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            log::error!("Failed to finalize WAV recording {:?}: {}", self.path, e);
        }
    }
}
