use std::collections::HashMap;
use std::sync::Mutex;

use crate::crypto::{Address, PeerSessionId};

#[derive(Default)]
struct Bindings {
    by_peer: HashMap<PeerSessionId, Address>,
    by_identity: HashMap<Address, PeerSessionId>,
}

/// Bidirectional peer-session to identity bindings, strictly 1:1. In-memory
/// only: sessions are re-established on every client run, so nothing here
/// needs to survive a restart.
#[derive(Default)]
pub struct PeerRegistry {
    inner: Mutex<Bindings>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish the binding unconditionally, first evicting any existing
    /// binding that shares either the session id or the identity. Re-binding
    /// an identity to a new session silently drops the old session, and
    /// vice versa.
    pub fn bind(&self, peer: PeerSessionId, identity: Address) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(old_identity) = inner.by_peer.remove(&peer) {
            inner.by_identity.remove(&old_identity);
        }
        if let Some(old_peer) = inner.by_identity.remove(&identity) {
            inner.by_peer.remove(&old_peer);
        }
        inner.by_peer.insert(peer, identity);
        inner.by_identity.insert(identity, peer);
    }

    pub fn identity_of(&self, peer: &PeerSessionId) -> Option<Address> {
        self.inner.lock().unwrap().by_peer.get(peer).copied()
    }

    /// Identity lookups are case-insensitive by construction: addresses are
    /// stored in binary and hex case is normalized at parse time.
    pub fn peer_of(&self, identity: &Address) -> Option<PeerSessionId> {
        self.inner.lock().unwrap().by_identity.get(identity).copied()
    }

    /// No-op when the session has no binding.
    pub fn unbind(&self, peer: &PeerSessionId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(identity) = inner.by_peer.remove(peer) {
            inner.by_identity.remove(&identity);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().by_peer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
