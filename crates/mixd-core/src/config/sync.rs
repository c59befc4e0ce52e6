//! Debounced settings writer
//!
//! Volume changes tend to arrive in bursts (a slider drag produces dozens).
//! [`SettingsSync`] coalesces them: the first change schedules one write
//! after a fixed interval, and every change before that deadline rides along
//! with it. The write stores whatever the settings are when the deadline
//! expires.
//!
//! ```text
//! set(0.9) ─┐
//! set(0.8) ─┼─ request_sync() ──► [scheduled] ── interval ──► save(0.7)
//! set(0.7) ─┘    (no-ops while scheduled)
//! ```
//!
//! Writes happen on a dedicated `mixer-settings-sync` thread. Failures are
//! logged and not retried until the next change requests another sync.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};

use super::settings::{MixerSettings, SettingsStore};

/// Default delay between the first unsaved change and the write
pub const DEFAULT_WRITE_INTERVAL: Duration = Duration::from_secs(2);

/// Commands sent to the sync thread
enum SyncCommand {
    /// Start the debounce timer if it isn't running
    Schedule,
    /// Write immediately, cancelling any pending timer
    FlushNow,
    /// Write any pending change and exit
    Shutdown,
}

/// Handle to the debounced settings writer
pub struct SettingsSync {
    current: Arc<Mutex<MixerSettings>>,
    scheduled: Arc<AtomicBool>,
    command_tx: Sender<SyncCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SettingsSync {
    /// Start the sync thread
    ///
    /// `initial` is the in-memory copy subsequent changes are applied to.
    pub fn spawn(store: Arc<dyn SettingsStore>, initial: MixerSettings, interval: Duration) -> Self {
        let (command_tx, command_rx) = crossbeam::channel::unbounded();
        let current = Arc::new(Mutex::new(initial));
        let scheduled = Arc::new(AtomicBool::new(false));

        let worker = SyncWorker {
            store,
            current: Arc::clone(&current),
            scheduled: Arc::clone(&scheduled),
            command_rx,
            interval,
        };

        let thread_handle = match thread::Builder::new()
            .name("mixer-settings-sync".into())
            .spawn(move || worker.run())
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn settings sync thread, settings won't be saved: {}", e);
                None
            }
        };

        Self {
            current,
            scheduled,
            command_tx,
            thread_handle,
        }
    }

    /// Apply a change to the in-memory settings
    ///
    /// Does not schedule a write; call [`request_sync`](Self::request_sync).
    pub fn update(&self, f: impl FnOnce(&mut MixerSettings)) {
        f(&mut self.current.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Snapshot of the in-memory settings
    pub fn current(&self) -> MixerSettings {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Schedule a write after the debounce interval
    ///
    /// No-op while a write is already scheduled.
    pub fn request_sync(&self) {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.command_tx.send(SyncCommand::Schedule).is_err() {
            log::warn!("Settings sync thread is gone, change will not be saved");
        }
    }

    /// Whether a write is waiting for its deadline
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Write the current settings now
    pub fn flush_now(&self) {
        if self.command_tx.send(SyncCommand::FlushNow).is_err() {
            log::warn!("Settings sync thread is gone, flush skipped");
        }
    }
}

impl Drop for SettingsSync {
    fn drop(&mut self) {
        let _ = self.command_tx.send(SyncCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Settings sync thread panicked");
            }
        }
    }
}

/// State owned by the sync thread
struct SyncWorker {
    store: Arc<dyn SettingsStore>,
    current: Arc<Mutex<MixerSettings>>,
    scheduled: Arc<AtomicBool>,
    command_rx: Receiver<SyncCommand>,
    interval: Duration,
}

impl SyncWorker {
    fn run(self) {
        log::debug!("Settings sync thread started ({:?} debounce)", self.interval);
        let mut deadline: Option<Instant> = None;

        loop {
            let command = match deadline {
                Some(due) => match self.command_rx.recv_deadline(due) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => Some(SyncCommand::Shutdown),
                },
                None => match self.command_rx.recv() {
                    Ok(command) => Some(command),
                    Err(_) => Some(SyncCommand::Shutdown),
                },
            };

            match command {
                // Deadline expired
                None => {
                    deadline = None;
                    self.write();
                }
                Some(SyncCommand::Schedule) => {
                    if deadline.is_none() {
                        deadline = Some(Instant::now() + self.interval);
                    }
                }
                Some(SyncCommand::FlushNow) => {
                    deadline = None;
                    self.write();
                }
                Some(SyncCommand::Shutdown) => {
                    if deadline.is_some() {
                        self.write();
                    }
                    break;
                }
            }
        }

        log::debug!("Settings sync thread stopped");
    }

    fn write(&self) {
        // Clear first: a change racing with the snapshot schedules a new write
        self.scheduled.store(false, Ordering::Release);
        let snapshot = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match self.store.save(&snapshot) {
            Ok(()) => log::debug!(
                "Saved mixer settings (volume {}%, muted {})",
                snapshot.master.volume,
                snapshot.master.mute
            ),
            Err(e) => log::error!("Failed to write audio mixer settings: {:#}", e),
        }
    }
}
