//! Peer registry
//!
//! Holds the most recently received full peer list. A refresh swaps the whole
//! list in one step, so readers either see the previous list or the new one,
//! never a mix. Readers get an immutable [`PeerSnapshot`] they can keep for as
//! long as they like.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::types::{Peer, PeerAddress};

/// Immutable view of the registry at one point in time
pub type PeerSnapshot = Arc<[Peer]>;

// ----------------------------------------------------------------------------
// Peer Registry
// ----------------------------------------------------------------------------

/// Shared handle to the known-peer set
///
/// Cloning the handle shares the same registry. The session is the single
/// writer; any number of readers may hold clones.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<RwLock<RegistryState>>,
}

#[derive(Debug)]
struct RegistryState {
    peers: PeerSnapshot,
    index: HashMap<PeerAddress, usize>,
}

impl Default for RegistryState {
    fn default() -> Self {
        Self {
            peers: empty_snapshot(),
            index: HashMap::new(),
        }
    }
}

fn empty_snapshot() -> PeerSnapshot {
    Arc::from(Vec::new())
}

impl PeerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire contents with `peers`
    ///
    /// Returns whether the new set differs from the previous one. Two sets are
    /// equal when they hold the same peers (address, name and status), in any
    /// order. If an address appears more than once only its first occurrence
    /// is kept.
    pub fn replace(&self, peers: impl IntoIterator<Item = Peer>) -> bool {
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for peer in peers {
            if seen.insert(peer.address) {
                fresh.push(peer);
            } else {
                debug!("Dropping duplicate peer entry for {}", peer.address);
            }
        }

        let index: HashMap<PeerAddress, usize> = fresh
            .iter()
            .enumerate()
            .map(|(position, peer)| (peer.address, position))
            .collect();

        let mut state = self.write();
        let changed = fresh.len() != state.peers.len()
            || fresh.iter().any(|peer| {
                state
                    .index
                    .get(&peer.address)
                    .map(|&position| state.peers[position] != *peer)
                    .unwrap_or(true)
            });

        state.peers = Arc::from(fresh);
        state.index = index;
        changed
    }

    /// Current peers in the order supplied by the last `replace`
    pub fn snapshot(&self) -> PeerSnapshot {
        Arc::clone(&self.read().peers)
    }

    /// Look up a peer by address
    pub fn get(&self, address: &PeerAddress) -> Option<Peer> {
        let state = self.read();
        state
            .index
            .get(address)
            .map(|&position| state.peers[position].clone())
    }

    pub fn is_empty(&self) -> bool {
        self.read().peers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.read().peers.len()
    }

    /// Drop every peer, as at the end of a session
    pub fn clear(&self) {
        let mut state = self.write();
        state.peers = empty_snapshot();
        state.index.clear();
    }

    // Registry contents are plain values, so a poisoned lock still holds a
    // consistent list.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
