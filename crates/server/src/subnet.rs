// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment subnet allocation.
//!
//! Subnets are /24s drawn in address order from the configured range.
//! A candidate is skipped when it overlaps an active environment's subnet
//! or anything already present in the routing table visible from the
//! target machine; the range running dry is an explicit error, never a
//! silent reuse.

use cilo_core::subnet::{overlaps, SubnetError, SubnetRange};
use ipnet::Ipv4Net;

use crate::error::ServerError;

pub struct SubnetAllocator {
    range: SubnetRange,
}

impl SubnetAllocator {
    pub fn new(cidr: Ipv4Net) -> Result<Self, SubnetError> {
        Ok(Self { range: SubnetRange::new(cidr)? })
    }

    pub fn range(&self) -> &SubnetRange {
        &self.range
    }

    /// First /24 clear of both the active set and foreign routes.
    pub fn allocate(
        &self,
        active: &[Ipv4Net],
        foreign_routes: &[Ipv4Net],
    ) -> Result<Ipv4Net, ServerError> {
        self.range
            .iter()
            .find(|candidate| {
                !active.iter().any(|used| overlaps(*candidate, *used))
                    && !foreign_routes.iter().any(|route| overlaps(*candidate, *route))
            })
            .ok_or(ServerError::SubnetExhausted)
    }
}

/// Parse `ip route` output into the prefixes it mentions.
///
/// Lines look like `10.224.1.0/24 via 10.100.0.1 dev cilo0` or
/// `default via 192.168.1.1 dev eth0`; only explicit IPv4 prefixes count.
pub fn parse_routes(output: &str) -> Vec<Ipv4Net> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|prefix| prefix.parse().ok())
        .collect()
}

/// Routing table of the local host, for collision checks when the target
/// machine is this host. Unreadable tables are treated as empty.
pub async fn host_routes() -> Vec<Ipv4Net> {
    match cilo_engine::subprocess::run_checked(
        "ip",
        &["route"],
        std::time::Duration::from_secs(5),
        "ip route",
    )
    .await
    {
        Ok(out) => parse_routes(&out),
        Err(e) => {
            tracing::debug!(error = %e, "could not read host routes");
            Vec::new()
        }
    }
}

#[cfg(test)]
#[path = "subnet_tests.rs"]
mod tests;
