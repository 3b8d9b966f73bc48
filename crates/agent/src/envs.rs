// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment bring-up and teardown on this machine.
//!
//! Order on the way up: validate the name, ensure the bridge network with
//! the allocated subnet, parse the workspace through the registry, realize
//! it on the runtime, and read back the per-service addresses. Failure
//! unwinds in reverse; teardown paths are idempotent so the control plane
//! can always retry them.

use crate::error::AgentError;
use crate::workspace::WorkspaceStore;
use cilo_core::validate_name;
use cilo_engine::{
    EnvironmentDescription, LogOptions, Logs, ParserRegistry, Runtime, UpOptions,
};
use cilo_wire::{AgentEnvironment, ServiceAddress, StatusResponse};
use ipnet::Ipv4Net;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

pub struct EnvManager {
    registry: ParserRegistry,
    runtime: Arc<dyn Runtime>,
    workspaces: WorkspaceStore,
}

impl EnvManager {
    pub fn new(registry: ParserRegistry, runtime: Arc<dyn Runtime>, workspaces: WorkspaceStore) -> Self {
        Self { registry, runtime, workspaces }
    }

    pub fn workspaces(&self) -> &WorkspaceStore {
        &self.workspaces
    }

    pub fn runtime(&self) -> &dyn Runtime {
        self.runtime.as_ref()
    }

    fn parse(&self, env: &str) -> Result<EnvironmentDescription, AgentError> {
        let dir = self.workspaces.path_for(env)?;
        if !dir.is_dir() {
            return Err(AgentError::NotFound(format!("workspace for {env}")));
        }
        Ok(self.registry.parse(&dir)?)
    }

    /// Bring an environment up; returns the service → IP map.
    pub async fn up(
        &self,
        env: &str,
        subnet: Ipv4Net,
        build: bool,
        recreate: bool,
    ) -> Result<BTreeMap<String, Ipv4Addr>, AgentError> {
        validate_name(env)?;
        let desc = self.parse(env)?;
        self.runtime.create_network(env, subnet).await?;

        let opts = UpOptions { build, recreate };
        let result = match self.runtime.up(&desc, env, &opts).await {
            Ok(()) => Ok(()),
            // One retry when the failure is the network-already-exists
            // idempotency case (a racing create between our ensure and up).
            Err(e) if e.is_already_exists() => self.runtime.up(&desc, env, &opts).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            // Unwind in reverse: stop whatever partially started, then
            // drop the network we created.
            tracing::warn!(environment = env, error = %e, "bring-up failed; cleaning up");
            let _ = self.runtime.down(&desc, env).await;
            let _ = self.runtime.remove_network(env).await;
            return Err(e.into());
        }

        let services = self.runtime.services(&desc, env).await?;
        let map = services
            .into_iter()
            .filter_map(|s| s.ip.map(|ip| (s.name, ip)))
            .collect::<BTreeMap<_, _>>();
        tracing::info!(environment = env, services = map.len(), "environment up");
        Ok(map)
    }

    /// Stop containers; the network and workspace stay for a later `up`.
    pub async fn down(&self, env: &str) -> Result<(), AgentError> {
        validate_name(env)?;
        let desc = match self.parse(env) {
            Ok(desc) => desc,
            // Nothing on disk means nothing to stop
            Err(AgentError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        self.runtime.down(&desc, env).await?;
        tracing::info!(environment = env, "environment down");
        Ok(())
    }

    /// Remove containers, network, and workspace. Idempotent throughout.
    pub async fn destroy(&self, env: &str) -> Result<(), AgentError> {
        validate_name(env)?;
        match self.parse(env) {
            Ok(desc) => {
                if let Err(e) = self.runtime.destroy(&desc, env).await {
                    tracing::warn!(environment = env, error = %e, "container teardown failed");
                }
            }
            Err(AgentError::NotFound(_)) => {}
            // A workspace too broken to parse still gets its network and
            // tree removed below.
            Err(e) => tracing::warn!(environment = env, error = %e, "skipping compose teardown"),
        }
        self.runtime.remove_network(env).await?;
        self.workspaces.remove(env).await?;
        tracing::info!(environment = env, "environment destroyed");
        Ok(())
    }

    pub async fn status(&self, env: &str) -> Result<StatusResponse, AgentError> {
        validate_name(env)?;
        let desc = self.parse(env)?;
        let states = self.runtime.status(&desc, env).await?;
        let infos = self.runtime.services(&desc, env).await?;

        let mut services: Vec<ServiceAddress> = infos
            .into_iter()
            .map(|s| ServiceAddress { name: s.name, ip: s.ip, ports: s.ports })
            .collect();
        // Surface declared-but-not-running services too
        for spec in &desc.services {
            if !services.iter().any(|s| s.name == spec.name) {
                services.push(ServiceAddress {
                    name: spec.name.clone(),
                    ip: None,
                    ports: spec.ports.iter().map(|p| p.to_string()).collect(),
                });
            }
        }

        let running = states.iter().any(|s| s.state.eq_ignore_ascii_case("running"));
        Ok(StatusResponse { name: env.to_string(), services, running })
    }

    pub async fn logs(
        &self,
        env: &str,
        service: Option<&str>,
        opts: &LogOptions,
    ) -> Result<Logs, AgentError> {
        validate_name(env)?;
        let desc = self.parse(env)?;
        if let Some(service) = service {
            if desc.service(service).is_none() {
                return Err(AgentError::NotFound(format!("service {service}")));
            }
        }
        Ok(self.runtime.logs(&desc, env, service, opts).await?)
    }

    pub async fn exec(
        &self,
        env: &str,
        service: &str,
        cmd: &[String],
    ) -> Result<String, AgentError> {
        validate_name(env)?;
        let desc = self.parse(env)?;
        if desc.service(service).is_none() {
            return Err(AgentError::NotFound(format!("service {service}")));
        }
        Ok(self.runtime.exec(&desc, env, service, cmd).await?)
    }

    /// Environments present on this machine, by workspace.
    pub async fn list(&self) -> Result<Vec<AgentEnvironment>, AgentError> {
        let networks = self.runtime.list_owned_networks().await.unwrap_or_default();
        let mut out = Vec::new();
        for name in self.workspaces.list()? {
            let network = cilo_engine::network_name(&name);
            out.push(AgentEnvironment {
                workspace: self.workspaces.path_for(&name)?.display().to_string(),
                network: networks.contains(&network).then_some(network),
                name,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "envs_tests.rs"]
mod tests;
