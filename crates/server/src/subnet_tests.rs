// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap()
}

fn allocator() -> SubnetAllocator {
    SubnetAllocator::new(net("10.224.0.0/16")).unwrap()
}

#[test]
fn first_allocation_is_the_one_network() {
    let subnet = allocator().allocate(&[], &[]).unwrap();
    assert_eq!(subnet, net("10.224.1.0/24"));
}

#[test]
fn active_subnets_are_skipped() {
    let subnet = allocator().allocate(&[net("10.224.1.0/24")], &[]).unwrap();
    assert_eq!(subnet, net("10.224.2.0/24"));
}

#[test]
fn foreign_routes_are_skipped() {
    // A pre-existing host route on the first candidate pushes allocation on
    let subnet = allocator().allocate(&[], &[net("10.224.1.0/24")]).unwrap();
    assert_eq!(subnet, net("10.224.2.0/24"));
}

#[test]
fn wider_foreign_routes_block_everything_they_cover() {
    let subnet = allocator()
        .allocate(&[], &[net("10.224.0.0/22")])
        .unwrap();
    // /22 covers .0 through .3
    assert_eq!(subnet, net("10.224.4.0/24"));
}

#[test]
fn exhaustion_is_an_explicit_error() {
    let allocator = SubnetAllocator::new(net("10.224.0.0/22")).unwrap();
    let active: Vec<Ipv4Net> = allocator.range().iter().collect();
    assert_eq!(active.len(), 3);
    let err = allocator.allocate(&active, &[]).unwrap_err();
    assert!(matches!(err, ServerError::SubnetExhausted));
}

#[test]
fn allocate_free_allocate_again_is_stable() {
    let allocator = allocator();
    let mut active = Vec::new();
    for _ in 0..10 {
        let subnet = allocator.allocate(&active, &[]).unwrap();
        assert!(!active.contains(&subnet));
        active.push(subnet);
    }
    let first_round = active.clone();

    // Free everything and do it again: same non-overlapping result
    let mut again = Vec::new();
    for _ in 0..10 {
        let subnet = allocator.allocate(&again, &[]).unwrap();
        again.push(subnet);
    }
    assert_eq!(first_round, again);
    for (i, a) in again.iter().enumerate() {
        for b in again.iter().skip(i + 1) {
            assert!(!cilo_core::subnet::overlaps(*a, *b));
        }
    }
}

#[test]
fn route_parsing_picks_prefixes_only() {
    let output = "\
default via 192.168.1.1 dev eth0 proto dhcp
10.224.1.0/24 via 10.100.0.1 dev cilo0
172.17.0.0/16 dev docker0 proto kernel scope link
192.168.1.0/24 dev eth0 proto kernel scope link src 192.168.1.50
";
    let routes = parse_routes(output);
    assert_eq!(
        routes,
        vec![net("10.224.1.0/24"), net("172.17.0.0/16"), net("192.168.1.0/24")]
    );
}

#[test]
fn route_parsing_tolerates_empty_output() {
    assert!(parse_routes("").is_empty());
}
