// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Format-neutral environment description.
//!
//! This is the contract between parsers and runtimes: parsers produce it,
//! runtimes realize it. It carries every field relevant to container
//! placement; presentation-only fields pass through as labels.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Label that marks a service as the environment's ingress.
pub const INGRESS_LABEL: &str = "cilo.ingress";
/// Label carrying extra comma-separated hostnames to publish.
pub const HOSTNAMES_LABEL: &str = "cilo.hostnames";

/// A parsed project: the set of services to run plus their shared
/// networks and volumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDescription {
    /// Directory the project was parsed from
    pub source_dir: PathBuf,
    /// The file that defined the project (compose file for the compose format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
    /// Format tag of the parser that produced this description
    pub format: String,
    pub services: Vec<ServiceSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl EnvironmentDescription {
    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.name == name)
    }

    /// The service backing `*.project.env.suffix`, when one is labeled.
    pub fn ingress_service(&self) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.is_ingress())
    }
}

/// One container to run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<CommandSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthCheck>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    /// Container hostname, when the project pins one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl ServiceSpec {
    pub fn is_ingress(&self) -> bool {
        self.labels.get(INGRESS_LABEL).map(|v| v == "true").unwrap_or(false)
    }

    /// Names to publish beyond `<name>.<env>.<suffix>`: the pinned hostname
    /// plus any `cilo.hostnames` label entries.
    pub fn extra_hostnames(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(h) = &self.hostname {
            if h != &self.name {
                out.push(h.clone());
            }
        }
        if let Some(list) = self.labels.get(HOSTNAMES_LABEL) {
            for h in list.split(',') {
                let h = h.trim();
                if !h.is_empty() && !out.iter().any(|e| e == h) {
                    out.push(h.to_string());
                }
            }
        }
        out
    }
}

/// Command or entrypoint: either a shell string or an exec vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Shell(String),
    Exec(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

/// A published port. `host` keeps the original string form because it may
/// carry a bind address (`127.0.0.1:8080`) or a range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub container: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

impl std::fmt::Display for PortMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.host {
            Some(host) => write!(f, "{}:{}", host, self.container)?,
            None => write!(f, "{}", self.container)?,
        }
        if let Some(proto) = &self.protocol {
            write!(f, "/{}", proto)?;
        }
        Ok(())
    }
}

/// A mounted volume or bind path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Named volume or host path; `None` for anonymous volumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub test: CommandSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_period: Option<String>,
}

impl Default for CommandSpec {
    fn default() -> Self {
        CommandSpec::Exec(Vec::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    /// External networks are attached, never created or destroyed
    #[serde(default)]
    pub external: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<Ipv4Net>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    /// External volumes survive destroy
    #[serde(default)]
    pub external: bool,
}

#[cfg(test)]
#[path = "description_tests.rs"]
mod tests;
