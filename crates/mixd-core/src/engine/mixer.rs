//! Mixer - sums every client stream into one output device
//!
//! One dedicated thread (`mixd-mixer`) runs the mix loop:
//!
//! 1. Sleep on the wake condition while there is nothing to mix (no active
//!    stream, and no pending stream with samples queued or a disconnect)
//! 2. Move newly created streams from *pending* into *active*
//! 3. Drop streams whose connection is gone
//! 4. Mix one block and write it to the device
//!
//! The device write blocks until the hardware has room, which paces the
//! loop. The membership lock only guards the pending hand-off; it is never
//! held while mixing or writing.
//!
//! Master volume and mute are set from control threads. They publish atomics
//! the mix loop reads once per block, persist the new value through the
//! debounced [`SettingsSync`], and notify every connected client.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::client::{ClientRegistry, MixerClient};
use super::cycle::MixCycle;
use super::envelope::{clamp_volume, VolumeControl};
use super::membership::MixerShared;
use super::stream::{stream_pair, StreamHandle, StreamId};
use crate::audio::{AudioResult, CpalSink, OutputSink};
use crate::config::{MixerConfig, SettingsStore, SettingsSync, YamlSettingsStore};

type SharedSink = Arc<Mutex<Box<dyn OutputSink>>>;

/// The audio mixer
///
/// Dropping the mixer stops its thread after the block in progress and
/// writes any pending settings change.
pub struct Mixer {
    shared: Arc<MixerShared>,
    device: SharedSink,
    /// Device rate, readable while the mixer thread holds the device
    sample_rate: AtomicU32,
    master_volume: VolumeControl,
    master_muted: Arc<AtomicBool>,
    /// Serializes control operations; never taken by the mixer thread
    control: Mutex<()>,
    settings: SettingsSync,
    clients: Arc<ClientRegistry>,
    next_stream_id: AtomicU64,
    config: MixerConfig,
    thread_handle: Option<JoinHandle<()>>,
}

impl Mixer {
    /// Create a mixer writing to `sink`
    ///
    /// Reads the master volume and mute state from `store`, opens the sink
    /// and starts the mixer thread. If the sink can't be opened the failure
    /// is logged and the mixer stays inert: control operations still work,
    /// but nothing is ever mixed.
    pub fn new(
        mut sink: Box<dyn OutputSink>,
        store: Arc<dyn SettingsStore>,
        clients: Arc<ClientRegistry>,
        config: MixerConfig,
    ) -> Self {
        let stored = store.load();
        log::info!(
            "Mixer: master volume {}%, muted {}",
            stored.master.volume,
            stored.muted()
        );

        let master_volume = VolumeControl::new(stored.volume());
        let master_muted = Arc::new(AtomicBool::new(stored.muted()));
        let settings = SettingsSync::spawn(store, stored, config.settings_write_interval());
        let shared = Arc::new(MixerShared::default());

        let opened = sink.open();
        let sample_rate = sink.sample_rate();
        let device: SharedSink = Arc::new(Mutex::new(sink));

        let thread_handle = match opened {
            Ok(()) => {
                let cycle = MixCycle::new(
                    config.block_frames,
                    config.ramp_ticks,
                    master_volume.clone(),
                    Arc::clone(&master_muted),
                );
                let block_duration = block_duration(config.block_frames, sample_rate);
                let thread_shared = Arc::clone(&shared);
                let thread_device = Arc::clone(&device);

                match thread::Builder::new()
                    .name("mixd-mixer".into())
                    .spawn(move || mix_loop(thread_shared, thread_device, cycle, block_duration))
                {
                    Ok(handle) => {
                        log::info!(
                            "Mixer: running ({} frames per block @ {} Hz)",
                            config.block_frames,
                            sample_rate
                        );
                        Some(handle)
                    }
                    Err(e) => {
                        log::error!("Mixer: failed to spawn mixer thread: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                log::error!("Mixer: failed to open audio output, mixing disabled: {}", e);
                None
            }
        };

        Self {
            shared,
            device,
            sample_rate: AtomicU32::new(sample_rate),
            master_volume,
            master_muted,
            control: Mutex::new(()),
            settings,
            clients,
            next_stream_id: AtomicU64::new(0),
            config,
            thread_handle,
        }
    }

    /// Create a mixer on the configured cpal device, with settings stored
    /// at the default location
    pub fn with_device(clients: Arc<ClientRegistry>, config: MixerConfig) -> Self {
        let sink = Box::new(CpalSink::new(config.audio.clone()));
        let store = Arc::new(YamlSettingsStore::default_location());
        Self::new(sink, store, clients, config)
    }

    /// Create a stream for `client` and hand it to the mixer thread
    ///
    /// An idle mixer wakes on the first enqueue, and those samples are in
    /// the next block written. The stream stays in the mix until `client` is
    /// dropped or the returned handle is dropped.
    pub fn create_queue<C: MixerClient + 'static>(&self, client: &Arc<C>) -> StreamHandle {
        let id = StreamId(self.next_stream_id.fetch_add(1, Ordering::Relaxed));
        let weak: Weak<dyn MixerClient> = Arc::downgrade(client) as Weak<dyn MixerClient>;
        let (handle, stream) = stream_pair(
            id,
            weak,
            Arc::clone(&self.shared),
            self.config.queue_capacity,
            self.config.ramp_ticks,
        );

        // Nobody drains pending without a mixer thread
        self.shared.add_pending(stream, self.thread_handle.is_none());

        log::debug!("Mixer: created {}", id);
        handle
    }

    /// Set the master volume (0.0 to 2.0)
    ///
    /// The output ramps to the new value. Setting the current value again
    /// does nothing.
    pub fn set_main_volume(&self, volume: f32) {
        let _control = self.control.lock().unwrap_or_else(PoisonError::into_inner);

        let volume = clamp_volume(volume);
        if volume == self.master_volume.target() {
            return;
        }
        self.master_volume.set(volume);

        self.settings.update(|s| s.set_volume(volume));
        self.settings.request_sync();

        self.clients
            .for_each(|client| client.did_change_main_mix_volume(volume));
    }

    /// Mute or unmute the master output
    pub fn set_muted(&self, muted: bool) {
        let _control = self.control.lock().unwrap_or_else(PoisonError::into_inner);

        if self.master_muted.load(Ordering::Acquire) == muted {
            return;
        }
        self.master_muted.store(muted, Ordering::Release);
        log::info!("Mixer: master {}", if muted { "muted" } else { "unmuted" });

        self.settings.update(|s| s.set_muted(muted));
        self.settings.request_sync();

        self.clients
            .for_each(|client| client.did_change_main_mix_muted_state(muted));
    }

    /// The master volume target
    pub fn main_volume(&self) -> f32 {
        self.master_volume.target()
    }

    pub fn is_muted(&self) -> bool {
        self.master_muted.load(Ordering::Acquire)
    }

    /// Reconfigure the output device sample rate
    pub fn set_audio_device_sample_rate(&self, sample_rate: u32) -> AudioResult<()> {
        let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        let result = device.set_sample_rate(sample_rate);
        // The sink may have settled on another rate, even on failure
        self.sample_rate.store(device.sample_rate(), Ordering::Release);
        match &result {
            Ok(()) => log::info!("Mixer: output sample rate set to {} Hz", sample_rate),
            Err(e) => log::error!("Mixer: failed to set output sample rate to {} Hz: {}", sample_rate, e),
        }
        result
    }

    pub fn audio_device_sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    /// Whether the mixer thread is running (false when the output failed to open)
    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Write the current master settings immediately
    pub fn flush_settings(&self) {
        self.settings.flush_now();
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        self.shared.shutdown();

        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Mixer: mixer thread panicked");
            }
        }
    }
}

fn block_duration(block_frames: usize, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(block_frames as f64 / sample_rate.max(1) as f64)
}

fn mix_loop(shared: Arc<MixerShared>, device: SharedSink, mut cycle: MixCycle, block_duration: Duration) {
    let mut write_failing = false;

    while let Some(admitted) = shared.wait_for_work(cycle.is_idle()) {
        cycle.admit(admitted);
        cycle.prune_disconnected();

        let block = cycle.mix_block();
        let result = device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(block);

        match result {
            Ok(()) => {
                if write_failing {
                    log::info!("Mixer: audio output recovered");
                    write_failing = false;
                }
            }
            Err(e) => {
                if !write_failing {
                    log::error!("Mixer: failed to write audio block: {}", e);
                    write_failing = true;
                }
                // The device didn't pace us
                thread::sleep(block_duration);
            }
        }
    }

    log::debug!("Mixer: thread stopped with {} active streams", cycle.active_count());
}
