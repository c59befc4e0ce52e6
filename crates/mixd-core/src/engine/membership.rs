//! Stream hand-off between producers and the mixer thread
//!
//! New streams wait in *pending* until the mixer thread adopts them. An idle
//! mixer sleeps until a pending stream has something to say: queued samples,
//! or a disconnect that needs pruning. A freshly created, still empty stream
//! does not wake it, so its first samples land in the first block written.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::stream::ClientAudioStream;

#[derive(Default)]
struct Membership {
    pending: Vec<ClientAudioStream>,
    shutdown: bool,
}

impl Membership {
    fn has_work(&self, idle: bool) -> bool {
        !idle
            || self
                .pending
                .iter()
                .any(|stream| stream.has_queued_samples() || !stream.is_connected())
    }
}

/// Pending streams plus the wake condition, shared by [`Mixer`](super::Mixer),
/// every [`StreamHandle`](super::StreamHandle) and the mixer thread
#[derive(Default)]
pub(crate) struct MixerShared {
    membership: Mutex<Membership>,
    wake: Condvar,
}

impl MixerShared {
    fn lock(&self) -> MutexGuard<'_, Membership> {
        self.membership.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a stream for adoption and wake the mixer thread
    ///
    /// With `prune` set, disconnected pending streams are dropped first.
    pub(crate) fn add_pending(&self, stream: ClientAudioStream, prune: bool) {
        {
            let mut membership = self.lock();
            if prune {
                membership.pending.retain(ClientAudioStream::is_connected);
            }
            membership.pending.push(stream);
        }
        self.wake.notify_one();
    }

    /// Wake the mixer thread to re-check for work
    ///
    /// Takes the lock so the signal can't slip in between the mixer's check
    /// and its wait.
    pub(crate) fn notify(&self) {
        drop(self.lock());
        self.wake.notify_one();
    }

    /// Ask the mixer thread to exit
    pub(crate) fn shutdown(&self) {
        self.lock().shutdown = true;
        self.wake.notify_all();
    }

    /// Block until there is something to mix
    ///
    /// `idle` is whether the mixer thread has no active streams. Returns the
    /// pending streams to adopt, or `None` once shutdown was requested.
    pub(crate) fn wait_for_work(&self, idle: bool) -> Option<Vec<ClientAudioStream>> {
        let membership = self.lock();
        let mut membership = self
            .wake
            .wait_while(membership, |m| !m.shutdown && !m.has_work(idle))
            .unwrap_or_else(PoisonError::into_inner);
        if membership.shutdown {
            return None;
        }
        Some(std::mem::take(&mut membership.pending))
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }
}
