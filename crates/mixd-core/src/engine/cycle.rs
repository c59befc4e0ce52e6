//! Mix cycle - the per-block work of the mixer thread
//!
//! Signal flow for one block:
//!
//! ```text
//! stream 1 ──► headroom ──► stream volume ──┐
//! stream 2 ──► headroom ──► stream volume ──┼──► Σ ──► master volume ──► clip ──► i16 LE
//! stream N ──► headroom ──► stream volume ──┘
//! ```
//!
//! Every stream is attenuated by a fixed headroom before summing so a few
//! full-scale sources don't clip immediately. When the master is muted, or
//! turned down below [`SILENCE_THRESHOLD`], a pre-allocated zero block is
//! emitted instead.
//!
//! All buffers are allocated once; `mix_block` never allocates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::envelope::{VolumeControl, VolumeEnvelope};
use super::stream::ClientAudioStream;
use crate::types::{StereoBuffer, BYTES_PER_FRAME};

/// Volume position every stream is scaled by before summing (-3dB)
pub const SAMPLE_HEADROOM: f32 = 0.95;

/// Master volume positions below this write digital silence
pub const SILENCE_THRESHOLD: f32 = 0.01;

/// Mixer-thread state: the active streams, master envelope and block buffers
pub struct MixCycle {
    active: Vec<ClientAudioStream>,
    master_volume: VolumeEnvelope,
    master_control: VolumeControl,
    master_muted: Arc<AtomicBool>,
    mixed: StereoBuffer,
    output: Vec<u8>,
    zeroes: Vec<u8>,
}

impl MixCycle {
    /// Create a cycle mixing `block_frames` frames per block
    ///
    /// The master envelope starts at rest on the control's current target.
    pub fn new(
        block_frames: usize,
        ramp_ticks: u32,
        master_control: VolumeControl,
        master_muted: Arc<AtomicBool>,
    ) -> Self {
        let block_bytes = block_frames * BYTES_PER_FRAME;
        Self {
            active: Vec::new(),
            master_volume: VolumeEnvelope::new(master_control.target(), ramp_ticks),
            master_control,
            master_muted,
            mixed: StereoBuffer::silence(block_frames),
            output: vec![0; block_bytes],
            zeroes: vec![0; block_bytes],
        }
    }

    /// Move newly created streams into the active set
    pub fn admit(&mut self, streams: impl IntoIterator<Item = ClientAudioStream>) {
        for stream in streams {
            stream.mark_admitted();
            log::debug!("Mixer: {} is now active", stream.id());
            self.active.push(stream);
        }
    }

    /// Drop every active stream whose connection is gone. Returns how many were dropped.
    pub fn prune_disconnected(&mut self) -> usize {
        let before = self.active.len();
        self.active.retain(|stream| {
            let connected = stream.is_connected();
            if !connected {
                log::debug!("Mixer: dropping disconnected {}", stream.id());
            }
            connected
        });
        before - self.active.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Whether there is nothing to mix
    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    /// Mix one block and return it as interleaved stereo i16 LE
    pub fn mix_block(&mut self) -> &[u8] {
        self.accumulate();
        self.render()
    }

    /// The accumulated block from the last `mix_block`, after master gain
    /// when it was applied
    pub fn mixed(&self) -> &StereoBuffer {
        &self.mixed
    }

    fn accumulate(&mut self) {
        self.master_volume.follow(&self.master_control);
        self.master_volume.advance_time();

        self.mixed.fill_silence();
        let frames = self.mixed.as_mut_slice();

        for stream in self.active.iter_mut() {
            if !stream.is_connected() {
                stream.clear();
                continue;
            }

            stream.advance_time();
            let muted = stream.is_muted();
            let volume = stream.volume();

            for frame in frames.iter_mut() {
                let Some(mut sample) = stream.next_sample() else {
                    break;
                };
                // Muted streams still drain
                if muted {
                    continue;
                }
                sample.log_multiply(SAMPLE_HEADROOM);
                sample.log_multiply(volume);
                *frame += sample;
            }
        }
    }

    fn render(&mut self) -> &[u8] {
        let master = self.master_volume.value();
        if self.master_muted.load(Ordering::Acquire) || master < SILENCE_THRESHOLD {
            return &self.zeroes;
        }

        for frame in self.mixed.iter_mut() {
            frame.log_multiply(master);
            frame.clip();
        }
        self.mixed.write_pcm_le(&mut self.output);
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::client::testing::RecordingClient;
    use crate::engine::client::MixerClient;
    use crate::engine::membership::MixerShared;
    use crate::engine::stream::{stream_pair, StreamHandle, StreamId};
    use crate::types::{log_gain, StereoSample};
    use std::sync::Weak;

    const BLOCK: usize = 8;
    const RAMP: u32 = 4;

    struct Harness {
        cycle: MixCycle,
        master: VolumeControl,
        muted: Arc<AtomicBool>,
        client: Arc<RecordingClient>,
        next_id: u64,
    }

    impl Harness {
        fn new() -> Self {
            let master = VolumeControl::new(1.0);
            let muted = Arc::new(AtomicBool::new(false));
            Self {
                cycle: MixCycle::new(BLOCK, RAMP, master.clone(), muted.clone()),
                master,
                muted,
                client: Arc::new(RecordingClient::default()),
                next_id: 0,
            }
        }

        fn add_stream(&mut self) -> StreamHandle {
            let weak: Weak<dyn MixerClient> = Arc::downgrade(&self.client) as Weak<dyn MixerClient>;
            let mixer = Arc::new(MixerShared::default());
            let (handle, stream) = stream_pair(StreamId(self.next_id), weak, mixer, 64, RAMP);
            self.next_id += 1;
            self.cycle.admit([stream]);
            handle
        }
    }

    fn headroom(value: f32) -> f32 {
        value * log_gain(SAMPLE_HEADROOM)
    }

    #[test]
    fn test_unity_stream_reproduces_headroom_scaled_input() {
        let mut h = Harness::new();
        let mut handle = h.add_stream();
        handle.enqueue(&[StereoSample::new(0.5, -0.25); BLOCK]);

        h.cycle.mix_block();
        for frame in h.cycle.mixed().iter() {
            assert_eq!(frame.left, headroom(0.5));
            assert_eq!(frame.right, headroom(-0.25));
        }
    }

    #[test]
    fn test_streams_are_summed() {
        let mut h = Harness::new();
        let mut a = h.add_stream();
        let mut b = h.add_stream();
        a.enqueue(&[StereoSample::mono(0.25); BLOCK]);
        b.enqueue(&[StereoSample::mono(0.125); BLOCK]);

        h.cycle.mix_block();
        let expected = headroom(0.25) + headroom(0.125);
        assert!((h.cycle.mixed()[0].left - expected).abs() < 1e-6);
    }

    #[test]
    fn test_muted_stream_contributes_nothing_but_drains() {
        let mut h = Harness::new();
        let mut handle = h.add_stream();
        handle.set_muted(true);
        handle.enqueue(&[StereoSample::mono(0.8); BLOCK]);

        let block = h.cycle.mix_block().to_vec();
        assert!(block.iter().all(|&b| b == 0));
        assert_eq!(handle.queued_samples(), 0);
    }

    #[test]
    fn test_starvation_is_silence() {
        let mut h = Harness::new();
        let mut handle = h.add_stream();
        handle.enqueue(&[StereoSample::mono(0.5); 3]);

        h.cycle.mix_block();
        let mixed = h.cycle.mixed();
        assert_eq!(mixed[2].left, headroom(0.5));
        for i in 3..BLOCK {
            assert_eq!(mixed[i], StereoSample::silence());
        }

        // An empty stream stays active and mixes silence
        let block = h.cycle.mix_block().to_vec();
        assert!(block.iter().all(|&b| b == 0));
        assert_eq!(h.cycle.active_count(), 1);
    }

    #[test]
    fn test_fifo_order_is_preserved() {
        let mut h = Harness::new();
        let mut handle = h.add_stream();
        let input: Vec<StereoSample> = (0..BLOCK * 2)
            .map(|i| StereoSample::mono(i as f32 / 32.0))
            .collect();
        handle.enqueue(&input);

        h.cycle.mix_block();
        let first: Vec<f32> = h.cycle.mixed().iter().map(|s| s.left).collect();
        h.cycle.mix_block();
        let second: Vec<f32> = h.cycle.mixed().iter().map(|s| s.left).collect();

        let expected: Vec<f32> = input.iter().map(|s| headroom(s.left)).collect();
        assert_eq!(first, expected[..BLOCK]);
        assert_eq!(second, expected[BLOCK..]);
    }

    #[test]
    fn test_master_mute_writes_zero_block() {
        let mut h = Harness::new();
        let mut handle = h.add_stream();
        handle.enqueue(&[StereoSample::mono(1.0); BLOCK]);
        h.muted.store(true, Ordering::Release);

        let block = h.cycle.mix_block();
        assert_eq!(block, vec![0u8; BLOCK * BYTES_PER_FRAME].as_slice());
    }

    #[test]
    fn test_master_volume_zero_writes_zero_block() {
        let master = VolumeControl::new(0.0);
        let muted = Arc::new(AtomicBool::new(false));
        let mut cycle = MixCycle::new(BLOCK, RAMP, master, muted);
        let client = Arc::new(RecordingClient::default());
        let weak: Weak<dyn MixerClient> = Arc::downgrade(&client) as Weak<dyn MixerClient>;
        let mixer = Arc::new(MixerShared::default());
        let (mut handle, stream) = stream_pair(StreamId(0), weak, mixer, 64, RAMP);
        cycle.admit([stream]);
        handle.enqueue(&[StereoSample::mono(1.0); BLOCK]);

        let block = cycle.mix_block();
        assert_eq!(block, vec![0u8; BLOCK * BYTES_PER_FRAME].as_slice());
    }

    #[test]
    fn test_master_volume_ramps_down_to_silence() {
        let mut h = Harness::new();
        let mut handle = h.add_stream();
        h.master.set(0.0);

        let mut previous = f32::MAX;
        for tick in 0..RAMP {
            handle.enqueue(&[StereoSample::mono(0.5); BLOCK]);
            let block = h.cycle.mix_block().to_vec();
            let level = h.cycle.mixed()[0].left;
            if tick + 1 < RAMP {
                assert!(level < previous);
                previous = level;
            } else {
                assert!(block.iter().all(|&b| b == 0));
            }
        }
    }

    #[test]
    fn test_clipping_limits_output() {
        let mut h = Harness::new();
        let mut a = h.add_stream();
        let mut b = h.add_stream();
        let mut c = h.add_stream();
        for handle in [&mut a, &mut b, &mut c] {
            handle.enqueue(&[StereoSample::mono(1.0); BLOCK]);
        }

        let block = h.cycle.mix_block();
        assert_eq!(&block[..2], &i16::MAX.to_le_bytes());
    }

    #[test]
    fn test_disconnected_stream_is_never_mixed() {
        let mut h = Harness::new();
        let mut handle = h.add_stream();
        handle.enqueue(&[StereoSample::mono(0.5); BLOCK]);
        drop(handle);

        let block = h.cycle.mix_block().to_vec();
        assert!(block.iter().all(|&b| b == 0));
        assert_eq!(h.cycle.prune_disconnected(), 1);
        assert!(h.cycle.is_idle());
    }

    #[test]
    fn test_dropped_client_prunes_stream() {
        let mut h = Harness::new();
        let mut handle = h.add_stream();
        handle.enqueue(&[StereoSample::mono(0.5); BLOCK]);
        h.client = Arc::new(RecordingClient::default());

        assert!(!handle.is_connected());
        let block = h.cycle.mix_block().to_vec();
        assert!(block.iter().all(|&b| b == 0));
        assert_eq!(h.cycle.prune_disconnected(), 1);
    }
}
