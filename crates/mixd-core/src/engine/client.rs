//! Client connections as seen by the mixer
//!
//! The connection layer lives outside this crate. The mixer only needs two
//! things from it: a way to notify every connected client when the master
//! volume or mute state changes, and a liveness check for the connection
//! that owns each stream. Both are expressed through [`MixerClient`] and
//! weak references, so the mixer never keeps a dead connection alive.

use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Callbacks a client connection receives from the mixer
///
/// Called synchronously from the thread that changed the setting; no
/// acknowledgment is expected.
pub trait MixerClient: Send + Sync {
    /// The master volume target changed (0.0 to 2.0)
    fn did_change_main_mix_volume(&self, volume: f32);

    /// The master mute state changed
    fn did_change_main_mix_muted_state(&self, muted: bool);
}

/// Registry of connected clients, owned by the connection layer and
/// injected into the mixer for broadcasts
///
/// Holds weak references only. Clients that have been dropped are pruned
/// lazily on the next iteration.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<Vec<Weak<dyn MixerClient>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connected client
    pub fn register<C: MixerClient + 'static>(&self, client: &Arc<C>) {
        let weak: Weak<dyn MixerClient> = Arc::downgrade(client) as Weak<dyn MixerClient>;
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(weak);
    }

    /// Number of clients still alive
    pub fn len(&self) -> usize {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.retain(|c| c.strong_count() > 0);
        clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `f` for every live client
    ///
    /// The registry lock is released before any callback runs, so clients
    /// may call back into the mixer or registry.
    pub fn for_each(&self, mut f: impl FnMut(&dyn MixerClient)) {
        let live: Vec<Arc<dyn MixerClient>> = {
            let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
            clients.retain(|c| c.strong_count() > 0);
            clients.iter().filter_map(Weak::upgrade).collect()
        };

        for client in &live {
            f(client.as_ref());
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::MixerClient;
    use std::sync::Mutex;

    /// Event observed by a [`RecordingClient`]
    #[derive(Debug, Clone, PartialEq)]
    pub enum ClientEvent {
        Volume(f32),
        Muted(bool),
    }

    /// Client that records every broadcast it receives
    #[derive(Default)]
    pub struct RecordingClient {
        events: Mutex<Vec<ClientEvent>>,
    }

    impl RecordingClient {
        pub fn events(&self) -> Vec<ClientEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl MixerClient for RecordingClient {
        fn did_change_main_mix_volume(&self, volume: f32) {
            self.events.lock().unwrap().push(ClientEvent::Volume(volume));
        }

        fn did_change_main_mix_muted_state(&self, muted: bool) {
            self.events.lock().unwrap().push(ClientEvent::Muted(muted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ClientEvent, RecordingClient};
    use super::*;

    #[test]
    fn test_broadcast_reaches_live_clients_only() {
        let registry = ClientRegistry::new();
        let alive = Arc::new(RecordingClient::default());
        let gone = Arc::new(RecordingClient::default());
        registry.register(&alive);
        registry.register(&gone);
        assert_eq!(registry.len(), 2);

        drop(gone);
        let mut calls = 0;
        registry.for_each(|client| {
            calls += 1;
            client.did_change_main_mix_muted_state(true);
        });

        assert_eq!(calls, 1);
        assert_eq!(alive.events(), vec![ClientEvent::Muted(true)]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_registry() {
        let registry = ClientRegistry::new();
        assert!(registry.is_empty());
        registry.for_each(|_| panic!("no clients registered"));
    }
}
