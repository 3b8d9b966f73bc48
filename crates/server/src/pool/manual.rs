// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manual provider: operator-registered machines.
//!
//! Lifecycle is external; the only thing cilo ever does to a manual
//! machine over SSH is the one-time agent install when the operator asks
//! for it at registration.

use super::{MachineProvider, ProviderError, ProvisionedMachine};
use async_trait::async_trait;
use cilo_core::Machine;
use cilo_engine::subprocess::run_checked;
use std::time::Duration;

/// Install gets minutes, not seconds: it may compile nothing but it does
/// pull a release binary.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

pub struct ManualProvider;

#[async_trait]
impl MachineProvider for ManualProvider {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn provision(&self) -> Result<ProvisionedMachine, ProviderError> {
        Err(ProviderError::Unsupported("manual"))
    }

    async fn destroy(&self, _machine: &Machine) -> Result<(), ProviderError> {
        // The operator owns the hardware; nothing to do.
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    async fn health(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Install the agent on a machine over SSH and return its WireGuard
/// public key. Used for manual registration (`--install`) and by the
/// cloud provider after instance creation.
pub async fn install_agent(
    address: &str,
    ssh_user: &str,
    server_public_key: Option<&str>,
) -> Result<String, ProviderError> {
    let target = format!("{ssh_user}@{address}");

    let mut script = String::from(
        "curl -fsSL https://get.cilo.dev/agent.sh | sh && systemctl enable --now cilo-agent",
    );
    if let Some(key) = server_public_key {
        // Authorize the server as a standing overlay peer
        script.push_str(&format!(" && cilo-agent authorize-server '{key}'"));
    }

    run_checked(
        "ssh",
        &["-o", "BatchMode=yes", "-o", "StrictHostKeyChecking=accept-new", &target, &script],
        INSTALL_TIMEOUT,
        "agent install",
    )
    .await
    .map_err(|e| ProviderError::Install(e.to_string()))?;

    // The installer writes the key where we can read it back
    run_checked(
        "ssh",
        &["-o", "BatchMode=yes", &target, "cat /var/cilo/wg.pub"],
        Duration::from_secs(30),
        "read machine key",
    )
    .await
    .map_err(|e| ProviderError::Install(e.to_string()))
}
