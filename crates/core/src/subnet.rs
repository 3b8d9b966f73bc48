// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subnet arithmetic for environment and peer address allocation.
//!
//! Environments get one /24 each out of a configured range (default
//! `10.224.0.0/16`); peers get single addresses out of a per-machine /24.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubnetError {
    #[error("range {0} is smaller than a /24")]
    RangeTooSmall(Ipv4Net),
    #[error("host index {0} out of range for /24")]
    HostOutOfRange(u32),
}

/// The `n`th host address within a network (network address + n).
///
/// Returns `None` when the offset walks past the broadcast address.
pub fn nth_host(net: Ipv4Net, n: u32) -> Option<Ipv4Addr> {
    let base = u32::from(net.network());
    let addr = base.checked_add(n)?;
    let candidate = Ipv4Addr::from(addr);
    if candidate > net.broadcast() {
        return None;
    }
    Some(candidate)
}

/// True when the two networks share any address.
pub fn overlaps(a: Ipv4Net, b: Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

/// A contiguous range of /24 subnets drawn from a wider prefix.
///
/// Index 0 is reserved (it shadows the range's own network address in
/// common configurations), so enumeration starts at the second /24.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetRange {
    base: Ipv4Net,
}

impl SubnetRange {
    pub fn new(base: Ipv4Net) -> Result<Self, SubnetError> {
        if base.prefix_len() > 24 {
            return Err(SubnetError::RangeTooSmall(base));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> Ipv4Net {
        self.base
    }

    /// Number of allocatable /24s in the range (excluding the reserved 0th).
    pub fn capacity(&self) -> usize {
        (1usize << (24 - self.base.prefix_len())).saturating_sub(1)
    }

    /// Iterate the allocatable /24s in address order.
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Net> + '_ {
        let base = u32::from(self.base.network());
        (1..=self.capacity() as u32).filter_map(move |i| {
            let net = Ipv4Addr::from(base + (i << 8));
            Ipv4Net::new(net, 24).ok()
        })
    }

    /// True when `net` is one of this range's /24s.
    pub fn contains(&self, net: Ipv4Net) -> bool {
        net.prefix_len() == 24 && self.base.contains(&net.network())
    }
}

#[cfg(test)]
#[path = "subnet_tests.rs"]
mod tests;
