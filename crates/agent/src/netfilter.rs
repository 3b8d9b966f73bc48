// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IP forwarding and firewall rules for the overlay.
//!
//! Three concerns: let traffic in and out of the overlay interface, NAT
//! the peer subnet through the container bridges so containers can reply,
//! and accept the established/related return path. Installation is
//! check-then-add (`iptables -C` before `-A`), so reruns are no-ops.

use crate::error::AgentError;
use cilo_engine::subprocess::{run_checked, DEFAULT_TIMEOUT};
use ipnet::Ipv4Net;

/// One iptables rule: the table it lives in, the chain, and the match/target args.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub table: Option<&'static str>,
    pub chain: &'static str,
    pub args: Vec<String>,
}

impl RuleSpec {
    fn cli_args(&self, action: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(table) = self.table {
            out.push("-t".to_string());
            out.push(table.to_string());
        }
        out.push(action.to_string());
        out.push(self.chain.to_string());
        out.extend(self.args.iter().cloned());
        out
    }
}

/// The rule set for one overlay interface and its peer subnet.
pub fn rule_specs(interface: &str, peer_subnet: Ipv4Net) -> Vec<RuleSpec> {
    let iface = interface.to_string();
    let subnet = peer_subnet.to_string();
    vec![
        RuleSpec {
            table: None,
            chain: "INPUT",
            args: vec!["-i".into(), iface.clone(), "-j".into(), "ACCEPT".into()],
        },
        RuleSpec {
            table: None,
            chain: "FORWARD",
            args: vec!["-i".into(), iface.clone(), "-j".into(), "ACCEPT".into()],
        },
        RuleSpec {
            table: None,
            chain: "FORWARD",
            args: vec!["-o".into(), iface, "-j".into(), "ACCEPT".into()],
        },
        // Return path for connections containers answer
        RuleSpec {
            table: None,
            chain: "FORWARD",
            args: vec![
                "-m".into(),
                "conntrack".into(),
                "--ctstate".into(),
                "ESTABLISHED,RELATED".into(),
                "-j".into(),
                "ACCEPT".into(),
            ],
        },
        // Peers reach containers with a machine-local source address
        RuleSpec {
            table: Some("nat"),
            chain: "POSTROUTING",
            args: vec!["-s".into(), subnet, "-j".into(), "MASQUERADE".into()],
        },
    ]
}

/// `net.ipv4.ip_forward=1`; required for peer → container routing.
pub async fn enable_ip_forwarding() -> Result<(), AgentError> {
    run_checked("sysctl", &["-w", "net.ipv4.ip_forward=1"], DEFAULT_TIMEOUT, "sysctl")
        .await
        .map_err(|e| AgentError::Overlay(e.to_string()))?;
    Ok(())
}

/// Install any rules not already present.
pub async fn ensure_rules(interface: &str, peer_subnet: Ipv4Net) -> Result<(), AgentError> {
    for rule in rule_specs(interface, peer_subnet) {
        let check: Vec<String> = rule.cli_args("-C");
        let check_refs: Vec<&str> = check.iter().map(String::as_str).collect();
        if run_checked("iptables", &check_refs, DEFAULT_TIMEOUT, "iptables check")
            .await
            .is_ok()
        {
            continue;
        }
        let add: Vec<String> = rule.cli_args("-A");
        let add_refs: Vec<&str> = add.iter().map(String::as_str).collect();
        run_checked("iptables", &add_refs, DEFAULT_TIMEOUT, "iptables add")
            .await
            .map_err(|e| AgentError::Overlay(e.to_string()))?;
        tracing::debug!(chain = rule.chain, table = ?rule.table, "installed firewall rule");
    }
    Ok(())
}

#[cfg(test)]
#[path = "netfilter_tests.rs"]
mod tests;
