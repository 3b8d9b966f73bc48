// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine entity and pool lifecycle.

use crate::environment::EnvironmentId;
use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a machine.
    pub struct MachineId("mch-");
}

/// Who manages the machine's lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Operator-registered; cilo never creates or destroys it
    #[default]
    Manual,
    /// Provisioned and destroyed through a cloud API
    Cloud,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Manual => write!(f, "manual"),
            Provider::Cloud => write!(f, "cloud"),
        }
    }
}

/// Status of a machine in the pool.
///
/// Auto-provisioned machines walk the full lifecycle; manual machines are
/// registered directly in `ready` and removed without `destroying`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    /// Cloud create issued, agent install pending
    #[default]
    Provisioning,
    /// Accepting an assignment
    Ready,
    /// Hosting exactly one environment
    Assigned,
    /// No new assignments; waiting for its environment to leave
    Draining,
    /// Cloud delete in progress
    Destroying,
    /// Terminal
    Destroyed,
    /// Provisioning or agent install failed beyond the retry ceiling
    Failed,
}

impl MachineStatus {
    pub fn can_transition(self, next: MachineStatus) -> bool {
        use MachineStatus::*;
        match (self, next) {
            (Provisioning, Ready | Failed) => true,
            (Ready, Assigned | Draining | Destroying) => true,
            (Assigned, Ready | Draining) => true,
            (Draining, Destroying) => true,
            (Destroying, Destroyed) => true,
            (Failed, Provisioning | Destroying) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MachineStatus::Destroyed)
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MachineStatus::Provisioning => "provisioning",
            MachineStatus::Ready => "ready",
            MachineStatus::Assigned => "assigned",
            MachineStatus::Draining => "draining",
            MachineStatus::Destroying => "destroying",
            MachineStatus::Destroyed => "destroyed",
            MachineStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for MachineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning" => Ok(MachineStatus::Provisioning),
            "ready" => Ok(MachineStatus::Ready),
            "assigned" => Ok(MachineStatus::Assigned),
            "draining" => Ok(MachineStatus::Draining),
            "destroying" => Ok(MachineStatus::Destroying),
            "destroyed" => Ok(MachineStatus::Destroyed),
            "failed" => Ok(MachineStatus::Failed),
            other => Err(format!("unknown machine status: {other:?}")),
        }
    }
}

/// One host capable of running environments; owned by exactly one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub provider: Provider,
    /// Reachable address: cloud public IP, or operator-supplied for manual
    pub address: String,
    /// `host:port` the overlay peers dial
    pub endpoint: String,
    /// The machine's WireGuard public key (base64)
    pub public_key: String,
    pub status: MachineStatus,
    /// At most one environment per machine in v1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<EnvironmentId>,
    /// The /24 this machine hands out to connected peers
    pub peer_subnet: Ipv4Net,
    pub created_at: DateTime<Utc>,
}

impl Machine {
    pub fn is_assignable(&self) -> bool {
        self.status == MachineStatus::Ready && self.environment_id.is_none()
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
