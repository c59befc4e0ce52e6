//! Common types for mixd
//!
//! The fundamental audio value types used throughout the mixing engine:
//! stereo frames, fixed-size frame buffers and the logarithmic gain curve
//! shared by stream and master volume.

use std::ops::{Index, IndexMut};

/// Default hardware sample rate (44.1kHz, what the output device is opened at
/// unless configured otherwise)
pub const SAMPLE_RATE: u32 = 44100;

/// Number of interleaved channels on the wire
pub const CHANNELS: usize = 2;

/// Bytes per stereo frame on the wire (2 channels x 16-bit)
pub const BYTES_PER_FRAME: usize = CHANNELS * std::mem::size_of::<i16>();

/// Audio sample type (32-bit float while mixing, 16-bit on the wire)
pub type Sample = f32;

/// Attenuation range covered by gain inputs 0.0..=1.0 (in dB)
pub const DYNAMIC_RANGE_DB: f32 = 60.0;

/// Boost range covered by gain inputs 1.0..=2.0 (in dB)
pub const BOOST_RANGE_DB: f32 = 6.0;

/// Convert decibels to a linear amplitude factor
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Map a volume control position to a linear amplitude factor
///
/// Volume positions are perceptual, not linear:
/// - 0.0 = true silence
/// - 0.0 to 1.0 = -60dB to 0dB (linear in dB)
/// - 1.0 to 2.0 = 0dB to +6dB (linear in dB)
///
/// Positions outside 0.0..=2.0 are clamped.
#[inline]
pub fn log_gain(position: f32) -> f32 {
    if position <= 0.0 {
        return 0.0;
    }
    let position = position.min(2.0);
    let db = if position <= 1.0 {
        DYNAMIC_RANGE_DB * (position - 1.0)
    } else {
        BOOST_RANGE_DB * (position - 1.0)
    };
    db_to_linear(db)
}

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Scale both channels by a volume position on the logarithmic curve
    ///
    /// See [`log_gain`] for the mapping.
    #[inline]
    pub fn log_multiply(&mut self, position: f32) {
        let factor = log_gain(position);
        self.left *= factor;
        self.right *= factor;
    }

    /// Clamp both channels to [-1.0, 1.0]
    #[inline]
    pub fn clip(&mut self) {
        self.left = self.left.clamp(-1.0, 1.0);
        self.right = self.right.clamp(-1.0, 1.0);
    }

    /// Encode as interleaved little-endian 16-bit PCM: [L lo, L hi, R lo, R hi]
    ///
    /// Channels are expected to be clipped already; out-of-range values
    /// saturate.
    #[inline]
    pub fn to_pcm_le(&self) -> [u8; BYTES_PER_FRAME] {
        let left = (self.left * i16::MAX as f32) as i16;
        let right = (self.right * i16::MAX as f32) as i16;
        let [l0, l1] = left.to_le_bytes();
        let [r0, r1] = right.to_le_bytes();
        [l0, l1, r0, r1]
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

/// A fixed-length buffer of stereo samples
///
/// The mixer allocates these once at startup and only overwrites them in
/// the mix loop.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Get the number of stereo samples in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Fill the buffer with silence
    pub fn fill_silence(&mut self) {
        self.samples.fill(StereoSample::silence());
    }

    /// Get a mutable slice of the samples
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Encode the whole buffer as interleaved little-endian 16-bit PCM
    ///
    /// `out` must hold exactly `len() * BYTES_PER_FRAME` bytes.
    pub fn write_pcm_le(&self, out: &mut [u8]) {
        assert_eq!(out.len(), self.samples.len() * BYTES_PER_FRAME);
        for (frame, sample) in out.chunks_exact_mut(BYTES_PER_FRAME).zip(self.samples.iter()) {
            frame.copy_from_slice(&sample.to_pcm_le());
        }
    }

    /// Get an iterator over the samples
    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }

    /// Get a mutable iterator over the samples
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StereoSample> {
        self.samples.iter_mut()
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}
