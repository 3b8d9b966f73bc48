// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment entity and lifecycle.
//!
//! An environment is one isolated running copy of a project, identified by
//! name within a team. Status transitions follow a fixed state machine;
//! anything that mutates a stored environment goes through
//! [`EnvironmentStatus::can_transition`] first.

use crate::machine::MachineId;
use crate::peer::Peer;
use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

crate::define_id! {
    /// Unique identifier for an environment.
    pub struct EnvironmentId("env-");
}

/// How the environment came to exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Created by a developer at a terminal
    #[default]
    Interactive,
    /// Created by CI or another automated caller
    Automated,
    /// Created outside cilo and adopted (local compose project)
    External,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Interactive => write!(f, "interactive"),
            Origin::Automated => write!(f, "automated"),
            Origin::External => write!(f, "external"),
        }
    }
}

/// Status of an environment in its lifecycle.
///
/// ```text
/// provisioning → syncing → running ⇄ stopped → destroying → destroyed
///        └──────────┴─────────┴─────────┴──→ error → destroying
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentStatus {
    /// Machine assigned, subnet allocated, nothing running yet
    #[default]
    Provisioning,
    /// Workspace transfer in progress
    Syncing,
    /// Containers up
    Running,
    /// Containers stopped, workspace retained
    Stopped,
    /// Tear-down in progress
    Destroying,
    /// Terminal: containers, network, and workspace removed
    Destroyed,
    /// Sink for bring-up failures; only destroying leads out
    Error,
}

impl EnvironmentStatus {
    /// Whether the state machine permits moving to `next`.
    ///
    /// Destroying is reachable from every non-terminal state so tear-down
    /// can always make progress; Error is reachable from every active state.
    pub fn can_transition(self, next: EnvironmentStatus) -> bool {
        use EnvironmentStatus::*;
        match (self, next) {
            (Provisioning, Syncing) => true,
            (Syncing, Running) => true,
            (Running, Stopped) => true,
            (Stopped, Running) => true,
            (Destroying, Destroyed) => true,
            (Provisioning | Syncing | Running | Stopped, Error) => true,
            (Provisioning | Syncing | Running | Stopped | Error, Destroying) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EnvironmentStatus::Destroyed)
    }

    /// Active environments hold a subnet and possibly a machine.
    pub fn is_active(self) -> bool {
        !matches!(self, EnvironmentStatus::Destroyed)
    }
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnvironmentStatus::Provisioning => "provisioning",
            EnvironmentStatus::Syncing => "syncing",
            EnvironmentStatus::Running => "running",
            EnvironmentStatus::Stopped => "stopped",
            EnvironmentStatus::Destroying => "destroying",
            EnvironmentStatus::Destroyed => "destroyed",
            EnvironmentStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for EnvironmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning" => Ok(EnvironmentStatus::Provisioning),
            "syncing" => Ok(EnvironmentStatus::Syncing),
            "running" => Ok(EnvironmentStatus::Running),
            "stopped" => Ok(EnvironmentStatus::Stopped),
            "destroying" => Ok(EnvironmentStatus::Destroying),
            "destroyed" => Ok(EnvironmentStatus::Destroyed),
            "error" => Ok(EnvironmentStatus::Error),
            other => Err(format!("unknown environment status: {other:?}")),
        }
    }
}

/// One running container within an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    /// Image reference, or the build context when built locally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Address on the environment's bridge network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// Backs the `*.project.env.suffix` wildcard when set
    #[serde(default)]
    pub ingress: bool,
    /// Extra names published for this service
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,
}

/// Unit of isolation: one named copy of a project on one machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: EnvironmentId,
    pub name: String,
    pub team_id: String,
    /// Project tag; backs the `project.env.suffix` apex when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Detected project format tag (v1: always `compose`)
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<MachineId>,
    pub status: EnvironmentStatus,
    pub subnet: Ipv4Net,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peers: Vec<Peer>,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
    /// Auto-destroy deadline, when the caller asked for one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Environment {
    /// Running or stopped environments must be placed on a machine.
    pub fn placement_consistent(&self) -> bool {
        match self.status {
            EnvironmentStatus::Running | EnvironmentStatus::Stopped => self.machine_id.is_some(),
            _ => true,
        }
    }

    pub fn ingress_service(&self) -> Option<&Service> {
        self.services.iter().find(|s| s.ingress)
    }
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
