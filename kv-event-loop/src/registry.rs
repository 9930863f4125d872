use std::{collections::HashMap, net::SocketAddr};

use crate::peer::PeerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub addr: SocketAddr,
    pub alive: bool,
}

/// Peers known to the coordinator.
///
/// Owned by the coordinator task; nothing else holds a reference to it, so
/// there is no locking.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<PeerId, PeerRecord>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a peer as connected. Returns `false` if it was already known,
    /// in which case the registry is left untouched.
    pub fn register(&mut self, id: PeerId, addr: SocketAddr) -> bool {
        if self.peers.contains_key(&id) {
            return false;
        }
        self.peers.insert(id, PeerRecord { addr, alive: true });
        true
    }

    #[cfg(test)]
    pub fn get(&self, id: PeerId) -> Option<&PeerRecord> {
        self.peers.get(&id)
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    // Pairs with `len` for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
