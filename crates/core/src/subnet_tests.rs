// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap()
}

#[test]
fn nth_host_offsets_from_network_address() {
    let n = net("10.224.1.0/24");
    assert_eq!(nth_host(n, 1), Some(Ipv4Addr::new(10, 224, 1, 1)));
    assert_eq!(nth_host(n, 254), Some(Ipv4Addr::new(10, 224, 1, 254)));
}

#[test]
fn nth_host_rejects_past_broadcast() {
    let n = net("10.224.1.0/24");
    assert_eq!(nth_host(n, 256), None);
}

#[test]
fn overlap_detection() {
    assert!(overlaps(net("10.224.0.0/16"), net("10.224.5.0/24")));
    assert!(overlaps(net("10.224.5.0/24"), net("10.224.0.0/16")));
    assert!(!overlaps(net("10.224.1.0/24"), net("10.224.2.0/24")));
}

#[test]
fn range_iterates_24s_in_order_skipping_zeroth() {
    let range = SubnetRange::new(net("10.224.0.0/16")).unwrap();
    let first: Vec<_> = range.iter().take(3).collect();
    assert_eq!(
        first,
        vec![net("10.224.1.0/24"), net("10.224.2.0/24"), net("10.224.3.0/24")]
    );
}

#[test]
fn range_capacity_excludes_reserved() {
    let range = SubnetRange::new(net("10.224.0.0/16")).unwrap();
    assert_eq!(range.capacity(), 255);
    let range = SubnetRange::new(net("10.224.0.0/22")).unwrap();
    assert_eq!(range.capacity(), 3);
}

#[test]
fn range_rejects_narrower_than_24() {
    assert_eq!(
        SubnetRange::new(net("10.224.0.0/25")),
        Err(SubnetError::RangeTooSmall(net("10.224.0.0/25")))
    );
}

#[test]
fn range_containment() {
    let range = SubnetRange::new(net("10.224.0.0/16")).unwrap();
    assert!(range.contains(net("10.224.7.0/24")));
    assert!(!range.contains(net("10.225.1.0/24")));
    assert!(!range.contains(net("10.224.0.0/16")));
}

#[test]
fn iterated_subnets_never_overlap() {
    let range = SubnetRange::new(net("10.224.0.0/20")).unwrap();
    let nets: Vec<_> = range.iter().collect();
    assert_eq!(nets.len(), range.capacity());
    for (i, a) in nets.iter().enumerate() {
        for b in nets.iter().skip(i + 1) {
            assert!(!overlaps(*a, *b), "{a} overlaps {b}");
        }
    }
}
