// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream resolver discovery.
//!
//! Order: systemd-resolved status where available, then `resolv.conf`
//! with stub loopbacks filtered out, then public DNS as a last resort
//! (with a warning, since it leaks query names off-host).

use cilo_engine::subprocess::run_checked;
use std::net::IpAddr;
use std::time::Duration;

/// Last-resort public resolvers.
pub const PUBLIC_DNS: &[&str] = &["1.1.1.1", "8.8.8.8"];

/// Discover the host's real upstream resolvers.
pub async fn discover() -> Vec<String> {
    if let Ok(output) =
        run_checked("resolvectl", &["status"], Duration::from_secs(5), "resolvectl").await
    {
        let upstreams = parse_resolvectl(&output);
        if !upstreams.is_empty() {
            return upstreams;
        }
    }

    if let Ok(content) = std::fs::read_to_string("/etc/resolv.conf") {
        let upstreams = parse_resolv_conf(&content);
        if !upstreams.is_empty() {
            return upstreams;
        }
    }

    tracing::warn!("no host resolvers found; falling back to public DNS");
    PUBLIC_DNS.iter().map(|s| (*s).to_string()).collect()
}

/// `resolvectl status` output: `DNS Servers:` lines, possibly with
/// continuation lines of bare addresses.
pub fn parse_resolvectl(output: &str) -> Vec<String> {
    let mut upstreams = Vec::new();
    let mut in_servers = false;
    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("DNS Servers:") {
            in_servers = true;
            push_addr(&mut upstreams, rest.trim());
            continue;
        }
        if in_servers {
            if trimmed.parse::<IpAddr>().is_ok() {
                push_addr(&mut upstreams, trimmed);
                continue;
            }
            in_servers = false;
        }
    }
    upstreams
}

/// `resolv.conf` nameserver lines, minus loopback stubs. Pointing the
/// forwarder at a stub that delegates back to us would loop.
pub fn parse_resolv_conf(content: &str) -> Vec<String> {
    let mut upstreams = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let mut parts = line.split_whitespace();
        if parts.next() != Some("nameserver") {
            continue;
        }
        let Some(addr) = parts.next() else { continue };
        let Ok(parsed) = addr.parse::<IpAddr>() else { continue };
        if parsed.is_loopback() {
            continue;
        }
        push_addr(&mut upstreams, addr);
    }
    upstreams
}

fn push_addr(upstreams: &mut Vec<String>, addr: &str) {
    if addr.is_empty() {
        return;
    }
    if addr.parse::<IpAddr>().is_ok() && !upstreams.iter().any(|u| u == addr) {
        upstreams.push(addr.to_string());
    }
}

#[cfg(test)]
#[path = "upstreams_tests.rs"]
mod tests;
