// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolver configuration renderer.
//!
//! Output layout: forwarder declarations first (one upstream per line),
//! then one address directive per published name. The renderer starts
//! from the full environment list every time; it validates that no name
//! maps to two addresses before anything reaches the filesystem.
//!
//! Entries per environment:
//! - `service.env.suffix` for every service with an address
//! - `hostname.env.suffix` for every custom hostname
//! - `project.env.suffix` and the environment-wide wildcard (via the
//!   `env.suffix` domain directive, which a dnsmasq-family resolver
//!   matches for the apex and every name under it; the explicit service
//!   entries above are more specific and win) → ingress address

use super::ResolverError;
use cilo_core::Environment;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

/// Render the full resolver configuration.
pub fn render(
    environments: &[Environment],
    suffix: &str,
    upstreams: &[String],
) -> Result<String, ResolverError> {
    let entries = collect_entries(environments, suffix)?;

    let mut out = String::from("# generated by cilo; do not edit\n");
    let _ = writeln!(out, "port={}", super::RESOLVER_PORT);
    let _ = writeln!(out, "listen-address=127.0.0.1");
    for upstream in upstreams {
        let _ = writeln!(out, "server={upstream}");
    }
    for (name, ip) in &entries {
        let _ = writeln!(out, "address=/{name}/{ip}");
    }
    Ok(out)
}

/// All (name, address) pairs, validated for uniqueness.
fn collect_entries(
    environments: &[Environment],
    suffix: &str,
) -> Result<BTreeMap<String, Ipv4Addr>, ResolverError> {
    let mut entries: BTreeMap<String, Ipv4Addr> = BTreeMap::new();
    let mut insert = |name: String, ip: Ipv4Addr| -> Result<(), ResolverError> {
        if let Some(existing) = entries.get(&name) {
            if *existing != ip {
                return Err(ResolverError::Conflict {
                    name,
                    first: existing.to_string(),
                    second: ip.to_string(),
                });
            }
            return Ok(());
        }
        entries.insert(name, ip);
        Ok(())
    };

    for env in environments {
        for service in &env.services {
            let Some(ip) = service.ip else { continue };
            insert(format!("{}.{}.{}", service.name, env.name, suffix), ip)?;
            for hostname in &service.hostnames {
                insert(format!("{}.{}.{}", hostname, env.name, suffix), ip)?;
            }
        }

        if let (Some(project), Some(ingress)) = (&env.project, env.ingress_service()) {
            if let Some(ip) = ingress.ip {
                insert(format!("{}.{}.{}", project, env.name, suffix), ip)?;
                // Wildcard: the bare env domain catches apex and any
                // otherwise-unmatched name beneath it
                insert(format!("{}.{}", env.name, suffix), ip)?;
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
