// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-peer overlay scenario: two clients join one machine, one leaves.

use cilo_agent::peers::PeerMap;

#[test]
fn two_peers_join_and_one_leaves_without_disturbing_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let mut map =
        PeerMap::open(dir.path().join("peers.json"), "10.100.0.0/24".parse().unwrap()).unwrap();

    // User A and user B exchange keys with the same machine
    let a = map.allocate("key-user-a").unwrap();
    let b = map.allocate("key-user-b").unwrap();
    assert_ne!(a, b);

    // Removing B leaves A's entry exactly as it was
    map.remove("key-user-b").unwrap();
    assert_eq!(map.get("key-user-a"), Some(a));
    assert_eq!(map.get("key-user-b"), None);

    // A re-exchange by A converges on the same address
    assert_eq!(map.allocate("key-user-a").unwrap(), a);
}

#[test]
fn peer_addresses_stay_inside_the_machine_subnet() {
    let dir = tempfile::tempdir().unwrap();
    let subnet: ipnet::Ipv4Net = "10.100.0.0/24".parse().unwrap();
    let mut map = PeerMap::open(dir.path().join("peers.json"), subnet).unwrap();

    for i in 0..20 {
        let ip = map.allocate(&format!("key-{i}")).unwrap();
        assert!(subnet.contains(&ip));
    }
}
