//! Client audio streams - per-client sample queues
//!
//! Each stream is split into two halves at creation:
//!
//! - [`StreamHandle`]: the producer side, held by the client connection.
//!   Appends samples and adjusts the stream's volume and mute state.
//! - [`ClientAudioStream`]: the consumer side, owned by the mixer thread.
//!   Pulls samples one at a time and owns the stream's volume envelope.
//!
//! The two halves share a lock-free SPSC ring (`rtrb`). Once the mixer has
//! adopted a stream, enqueueing never touches the membership lock. Before
//! that, an enqueue (or dropping the handle) wakes a possibly idle mixer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::client::MixerClient;
use super::envelope::{VolumeControl, VolumeEnvelope};
use super::membership::MixerShared;
use crate::types::{Sample, StereoSample};

/// Default per-stream queue capacity in stereo frames (~370ms at 44.1kHz)
pub const DEFAULT_QUEUE_CAPACITY: usize = 16384;

/// Identifier for a stream, unique within one mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// State written by the producer side and read by the mixer thread
struct StreamShared {
    volume: VolumeControl,
    muted: AtomicBool,
    /// Set once the mixer thread moved the stream from pending to active
    admitted: AtomicBool,
    /// Set when the handle is dropped, before the mixer is woken
    closed: AtomicBool,
}

/// Create both halves of a new stream
pub(crate) fn stream_pair(
    id: StreamId,
    client: Weak<dyn MixerClient>,
    mixer: Arc<MixerShared>,
    capacity: usize,
    ramp_ticks: u32,
) -> (StreamHandle, ClientAudioStream) {
    let (producer, consumer) = rtrb::RingBuffer::<StereoSample>::new(capacity);
    let shared = Arc::new(StreamShared {
        volume: VolumeControl::new(1.0),
        muted: AtomicBool::new(false),
        admitted: AtomicBool::new(false),
        closed: AtomicBool::new(false),
    });

    let handle = StreamHandle {
        id,
        producer,
        shared: Arc::clone(&shared),
        client: client.clone(),
        mixer,
    };
    let stream = ClientAudioStream {
        id,
        consumer,
        shared,
        client,
        volume: VolumeEnvelope::new(1.0, ramp_ticks),
    };
    (handle, stream)
}

/// Producer side of a client stream
///
/// Dropping the handle disconnects the stream; anything still queued is
/// discarded by the mixer.
pub struct StreamHandle {
    id: StreamId,
    producer: rtrb::Producer<StereoSample>,
    shared: Arc<StreamShared>,
    client: Weak<dyn MixerClient>,
    mixer: Arc<MixerShared>,
}

impl StreamHandle {
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Append samples to the queue (non-blocking)
    ///
    /// Returns how many samples were accepted. When the queue is full the
    /// tail of `samples` is not enqueued; callers retry with the remainder.
    pub fn enqueue(&mut self, samples: &[StereoSample]) -> usize {
        let count = samples.len().min(self.producer.slots());
        if count == 0 {
            return 0;
        }
        let written = match self.producer.write_chunk_uninit(count) {
            Ok(chunk) => chunk.fill_from_iter(samples[..count].iter().copied()),
            Err(_) => 0,
        };
        if written > 0 {
            self.wake_mixer();
        }
        written
    }

    /// Append interleaved samples [L, R, L, R, ...]
    ///
    /// A trailing unpaired value is ignored. Returns the number of stereo
    /// frames accepted.
    pub fn enqueue_interleaved(&mut self, interleaved: &[Sample]) -> usize {
        let paired = interleaved.len() & !1;
        if paired != interleaved.len() {
            log::warn!(
                "{}: dropping unpaired trailing sample from interleaved buffer",
                self.id
            );
        }
        let frames: &[StereoSample] = bytemuck::cast_slice(&interleaved[..paired]);
        self.enqueue(frames)
    }

    /// Number of frames waiting to be mixed
    pub fn queued_samples(&self) -> usize {
        self.producer.buffer().capacity() - self.producer.slots()
    }

    /// Number of frames that can be enqueued right now
    pub fn free_capacity(&self) -> usize {
        self.producer.slots()
    }

    /// Set this stream's volume (0.0 to 2.0). Returns the clamped value.
    ///
    /// The mixer ramps toward the new value over the configured number of ticks.
    pub fn set_volume(&self, volume: f32) -> f32 {
        self.shared.volume.set(volume)
    }

    /// This stream's volume target
    pub fn volume(&self) -> f32 {
        self.shared.volume.target()
    }

    pub fn set_muted(&self, muted: bool) {
        self.shared.muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.shared.muted.load(Ordering::Relaxed)
    }

    /// Whether the owning connection still exists
    pub fn is_connected(&self) -> bool {
        self.client.strong_count() > 0
    }

    /// An idle mixer only sleeps on streams it hasn't adopted yet
    fn wake_mixer(&self) {
        if !self.shared.admitted.load(Ordering::Acquire) {
            self.mixer.notify();
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        // The producer is released after this returns, too late for the mixer's check
        self.shared.closed.store(true, Ordering::Release);
        self.wake_mixer();
    }
}

/// Consumer side of a client stream, owned by the mixer thread
pub struct ClientAudioStream {
    id: StreamId,
    consumer: rtrb::Consumer<StereoSample>,
    shared: Arc<StreamShared>,
    client: Weak<dyn MixerClient>,
    volume: VolumeEnvelope,
}

impl ClientAudioStream {
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Pop the next queued sample, or `None` if the queue is exhausted
    ///
    /// Never blocks.
    #[inline]
    pub fn next_sample(&mut self) -> Option<StereoSample> {
        self.consumer.pop().ok()
    }

    /// Whether the owning connection still exists and still holds its handle
    pub fn is_connected(&self) -> bool {
        self.client.strong_count() > 0 && !self.shared.closed.load(Ordering::Acquire)
    }

    pub fn has_queued_samples(&self) -> bool {
        self.consumer.slots() > 0
    }

    pub(crate) fn mark_admitted(&self) {
        self.shared.admitted.store(true, Ordering::Release);
    }

    /// Discard every queued sample
    pub fn clear(&mut self) {
        let queued = self.consumer.slots();
        if let Ok(chunk) = self.consumer.read_chunk(queued) {
            chunk.commit_all();
        }
    }

    #[inline]
    pub fn is_muted(&self) -> bool {
        self.shared.muted.load(Ordering::Relaxed)
    }

    /// Pick up the latest volume target and advance the envelope one tick
    #[inline]
    pub fn advance_time(&mut self) {
        self.volume.follow(&self.shared.volume);
        self.volume.advance_time();
    }

    /// Current envelope value
    #[inline]
    pub fn volume(&self) -> f32 {
        self.volume.value()
    }
}
