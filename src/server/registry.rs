use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::server::session::SessionId;

/// A registry of live sessions.
///
/// A session is present from the moment its connection is accepted until its
/// `start` promise settles, whether it resolved, rejected or panicked.
#[derive(Default)]
pub struct Registry {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub peer_addr: SocketAddr,
    pub connected_at: Instant,
    shutdown: CancellationToken,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session and returns the token that shuts it down.
    pub fn register(&self, id: SessionId, peer_addr: SocketAddr) -> CancellationToken {
        self.register_with(id, peer_addr, CancellationToken::new())
    }

    /// Registers a session under an existing token, typically a child of the
    /// server's shutdown token.
    pub fn register_with(
        &self,
        id: SessionId,
        peer_addr: SocketAddr,
        shutdown: CancellationToken,
    ) -> CancellationToken {
        self.sessions.lock().insert(
            id,
            SessionEntry {
                peer_addr,
                connected_at: Instant::now(),
                shutdown: shutdown.clone(),
            },
        );
        shutdown
    }

    /// Unregisters a session. Unknown ids are ignored.
    pub fn unregister(&self, id: SessionId) -> Option<SessionEntry> {
        self.sessions.lock().remove(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.lock().contains_key(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<SessionEntry> {
        self.sessions.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Ids of all live sessions, in ascending order.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Asks every live session to end. Sessions unregister themselves as they
    /// finish.
    pub fn shutdown_all(&self) {
        for entry in self.sessions.lock().values() {
            entry.shutdown.cancel();
        }
    }

    /// Returns a guard that unregisters `id` when dropped.
    pub fn guard(self: &Arc<Self>, id: SessionId) -> RegistryGuard {
        RegistryGuard {
            registry: Arc::clone(self),
            id,
        }
    }
}

/// Removes a session from the registry on drop, including when the session
/// task unwinds.
pub struct RegistryGuard {
    registry: Arc<Registry>,
    id: SessionId,
}

impl RegistryGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Unregisters the session now and returns its entry.
    pub fn release(self) -> Option<SessionEntry> {
        self.registry.unregister(self.id)
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}
