//! Volume envelopes - click-free gain transitions on a tick time base
//!
//! A [`VolumeEnvelope`] never jumps: every `set` starts a linear ramp from the
//! value currently heard to the new target. Time is measured in mix ticks
//! (one per output block), not wall-clock time, so a ramp always spans the
//! same number of output blocks.
//!
//! Envelopes are owned by the mixer thread. Other threads publish targets
//! through a [`VolumeControl`] (a single atomic), and the owner picks them up
//! with [`VolumeEnvelope::follow`] once per tick.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Lowest volume position (silence)
pub const MIN_VOLUME: f32 = 0.0;

/// Highest volume position (200%, +6dB)
pub const MAX_VOLUME: f32 = 2.0;

/// Default ramp length in ticks (~186ms with 512-frame blocks at 44.1kHz)
pub const DEFAULT_RAMP_TICKS: u32 = 16;

/// Clamp a volume position to the valid range, mapping NaN to silence
#[inline]
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        MIN_VOLUME
    } else {
        volume.clamp(MIN_VOLUME, MAX_VOLUME)
    }
}

/// A gain value that ramps linearly toward its target over a fixed number of ticks
#[derive(Debug, Clone)]
pub struct VolumeEnvelope {
    start: f32,
    target: f32,
    ramp_ticks: u32,
    elapsed: u32,
}

impl VolumeEnvelope {
    /// Create an envelope resting at `value`
    pub fn new(value: f32, ramp_ticks: u32) -> Self {
        let value = clamp_volume(value);
        Self {
            start: value,
            target: value,
            ramp_ticks,
            elapsed: ramp_ticks,
        }
    }

    /// Start a ramp from the current value to `target`
    pub fn set(&mut self, target: f32) {
        self.start = self.value();
        self.target = clamp_volume(target);
        self.elapsed = 0;
    }

    /// Advance the envelope clock by one tick
    #[inline]
    pub fn advance_time(&mut self) {
        if self.elapsed < self.ramp_ticks {
            self.elapsed += 1;
        }
    }

    /// Current interpolated value, clamped to [0.0, 2.0]
    #[inline]
    pub fn value(&self) -> f32 {
        if !self.is_ramping() {
            return self.target;
        }
        let progress = self.elapsed as f32 / self.ramp_ticks as f32;
        clamp_volume(self.start + (self.target - self.start) * progress)
    }

    /// The value this envelope is heading toward
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Whether a transition is still in progress
    #[inline]
    pub fn is_ramping(&self) -> bool {
        self.elapsed < self.ramp_ticks
    }

    /// Start a ramp if `control` publishes a target different from ours
    #[inline]
    pub fn follow(&mut self, control: &VolumeControl) {
        let published = control.target();
        if published.to_bits() != self.target.to_bits() {
            self.set(published);
        }
    }
}

/// Shared, lock-free volume target
///
/// Cloning is cheap (single `Arc` increment). Writers store a clamped target;
/// the envelope owner reads it once per tick.
#[derive(Debug, Clone)]
pub struct VolumeControl {
    target_bits: Arc<AtomicU32>,
}

impl VolumeControl {
    /// Create a control publishing `value`
    pub fn new(value: f32) -> Self {
        Self {
            target_bits: Arc::new(AtomicU32::new(clamp_volume(value).to_bits())),
        }
    }

    /// Publish a new target. Returns the clamped value actually stored.
    pub fn set(&self, value: f32) -> f32 {
        let value = clamp_volume(value);
        self.target_bits.store(value.to_bits(), Ordering::Release);
        value
    }

    /// The most recently published target
    #[inline]
    pub fn target(&self) -> f32 {
        f32::from_bits(self.target_bits.load(Ordering::Acquire))
    }
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}
