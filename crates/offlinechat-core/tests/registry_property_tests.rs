//! Property-based tests for the peer registry
//!
//! These tests verify that the registry always mirrors the most recently
//! supplied peer list and that change detection is structural.

use offlinechat_core::{Peer, PeerAddress, PeerRegistry, PeerStatus};
use proptest::prelude::*;
use std::collections::HashSet;

/// Generate an address from a small space so lists collide on purpose
fn arb_address() -> impl Strategy<Value = PeerAddress> {
    (0u8..16).prop_map(|id| PeerAddress::new([0x02, 0, 0, 0, 0, id]))
}

fn arb_status() -> impl Strategy<Value = PeerStatus> {
    (0i32..5).prop_map(PeerStatus::from_code)
}

fn arb_peer() -> impl Strategy<Value = Peer> {
    (arb_address(), "[a-z]{1,8}", arb_status())
        .prop_map(|(address, name, status)| Peer::new(address, name, status))
}

/// Peer lists with unique addresses, as a well-behaved transport reports them
fn arb_peer_list() -> impl Strategy<Value = Vec<Peer>> {
    prop::collection::vec(arb_peer(), 0..12).prop_map(|peers| {
        let mut seen = HashSet::new();
        peers
            .into_iter()
            .filter(|peer| seen.insert(peer.address))
            .collect()
    })
}

proptest! {
    /// Property: after any sequence of refreshes the snapshot is exactly the last list
    #[test]
    fn snapshot_equals_last_list(lists in prop::collection::vec(arb_peer_list(), 1..8)) {
        let registry = PeerRegistry::new();
        for list in &lists {
            registry.replace(list.clone());
        }

        let last = lists.last().cloned().unwrap_or_default();
        prop_assert_eq!(registry.snapshot().to_vec(), last.clone());
        prop_assert_eq!(registry.len(), last.len());
    }

    /// Property: replacing with an identical list is never a change
    #[test]
    fn replace_is_idempotent(list in arb_peer_list()) {
        let registry = PeerRegistry::new();
        registry.replace(list.clone());
        let before = registry.snapshot();

        prop_assert!(!registry.replace(list.clone()));
        prop_assert_eq!(registry.snapshot().to_vec(), before.to_vec());
    }

    /// Property: the change flag agrees with set equality
    #[test]
    fn change_flag_matches_set_difference(first in arb_peer_list(), second in arb_peer_list()) {
        let registry = PeerRegistry::new();
        registry.replace(first.clone());

        let first_set: HashSet<Peer> = first.into_iter().collect();
        let second_set: HashSet<Peer> = second.iter().cloned().collect();

        prop_assert_eq!(registry.replace(second), first_set != second_set);
    }

    /// Property: no address ever appears twice in a snapshot
    #[test]
    fn snapshot_has_no_duplicates(raw in prop::collection::vec(arb_peer(), 0..24)) {
        let registry = PeerRegistry::new();
        registry.replace(raw);

        let snapshot = registry.snapshot();
        let unique: HashSet<PeerAddress> = snapshot.iter().map(|peer| peer.address).collect();
        prop_assert_eq!(unique.len(), snapshot.len());
    }
}
