// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot reconciliation.
//!
//! On start the agent discovers what actually exists on the machine —
//! workspace directories and cilo-owned bridge networks — and flags
//! divergences between the two. Nothing is auto-repaired: a half-torn
//! environment is worth an operator's eyes, not a guess.

use crate::workspace::WorkspaceStore;
use cilo_engine::{Runtime, NETWORK_PREFIX};
use std::collections::BTreeSet;
use tracing::{info, warn};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Divergence {
    /// Workspace exists, no owned network: destroyed mid-way or never up
    pub workspace_only: Vec<String>,
    /// Owned network exists, no workspace: teardown lost the race at boot
    pub network_only: Vec<String>,
    /// Present on both sides
    pub intact: Vec<String>,
}

impl Divergence {
    pub fn is_clean(&self) -> bool {
        self.workspace_only.is_empty() && self.network_only.is_empty()
    }
}

/// Compare workspaces with owned networks and report the differences.
pub async fn reconcile(
    workspaces: &WorkspaceStore,
    runtime: &dyn Runtime,
) -> Result<Divergence, crate::error::AgentError> {
    let with_workspace: BTreeSet<String> = workspaces.list()?.into_iter().collect();
    let with_network: BTreeSet<String> = runtime
        .list_owned_networks()
        .await?
        .into_iter()
        .filter_map(|n| n.strip_prefix(NETWORK_PREFIX).map(str::to_string))
        .collect();

    let divergence = Divergence {
        workspace_only: with_workspace.difference(&with_network).cloned().collect(),
        network_only: with_network.difference(&with_workspace).cloned().collect(),
        intact: with_workspace.intersection(&with_network).cloned().collect(),
    };

    if divergence.is_clean() {
        info!(environments = divergence.intact.len(), "state reconciled clean");
    } else {
        for env in &divergence.workspace_only {
            warn!(environment = %env, "workspace present but no environment network");
        }
        for env in &divergence.network_only {
            warn!(environment = %env, "environment network present but no workspace");
        }
    }
    Ok(divergence)
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
