// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test doubles shared by the agent's unit tests.

use async_trait::async_trait;
use cilo_engine::{
    EnvironmentDescription, LogOptions, Logs, Runtime, RuntimeError, ServiceRuntimeInfo,
    ServiceState, UpOptions,
};
use ipnet::Ipv4Net;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

/// In-memory runtime: tracks networks and "running" services per env.
#[derive(Default)]
pub struct FakeRuntime {
    pub networks: Mutex<BTreeMap<String, Ipv4Net>>,
    pub running: Mutex<BTreeSet<String>>,
    /// When set, the next `up` fails once with this stderr text
    pub fail_up_once: Mutex<Option<String>>,
    pub up_calls: Mutex<u32>,
}

impl FakeRuntime {
    pub fn service_ip(subnet: Ipv4Net, index: u32) -> Ipv4Addr {
        cilo_core::subnet::nth_host(subnet, index + 2).unwrap_or(subnet.network())
    }
}

#[async_trait]
impl Runtime for FakeRuntime {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn up(
        &self,
        _desc: &EnvironmentDescription,
        env: &str,
        _opts: &UpOptions,
    ) -> Result<(), RuntimeError> {
        *self.up_calls.lock() += 1;
        if let Some(stderr) = self.fail_up_once.lock().take() {
            return Err(RuntimeError::Subprocess(
                cilo_engine::subprocess::SubprocessError::Failed {
                    label: "compose up".to_string(),
                    stderr,
                },
            ));
        }
        self.running.lock().insert(env.to_string());
        Ok(())
    }

    async fn down(&self, _desc: &EnvironmentDescription, env: &str) -> Result<(), RuntimeError> {
        self.running.lock().remove(env);
        Ok(())
    }

    async fn destroy(&self, desc: &EnvironmentDescription, env: &str) -> Result<(), RuntimeError> {
        self.down(desc, env).await
    }

    async fn status(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
    ) -> Result<Vec<ServiceState>, RuntimeError> {
        let state = if self.running.lock().contains(env) { "running" } else { "exited" };
        Ok(desc
            .services
            .iter()
            .map(|s| ServiceState { name: s.name.clone(), state: state.to_string() })
            .collect())
    }

    async fn services(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
    ) -> Result<Vec<ServiceRuntimeInfo>, RuntimeError> {
        if !self.running.lock().contains(env) {
            return Ok(Vec::new());
        }
        let subnet = self
            .networks
            .lock()
            .get(&cilo_engine::network_name(env))
            .copied()
            .unwrap_or_else(|| "10.224.1.0/24".parse().unwrap_or_else(|_| unreachable!()));
        Ok(desc
            .services
            .iter()
            .enumerate()
            .map(|(i, s)| ServiceRuntimeInfo {
                name: s.name.clone(),
                ip: Some(Self::service_ip(subnet, i as u32)),
                ports: s.ports.iter().map(|p| p.to_string()).collect(),
            })
            .collect())
    }

    async fn logs(
        &self,
        _desc: &EnvironmentDescription,
        env: &str,
        service: Option<&str>,
        _opts: &LogOptions,
    ) -> Result<Logs, RuntimeError> {
        Ok(Logs::Complete(format!("{env}:{}", service.unwrap_or("all"))))
    }

    async fn exec(
        &self,
        _desc: &EnvironmentDescription,
        _env: &str,
        _service: &str,
        cmd: &[String],
    ) -> Result<String, RuntimeError> {
        Ok(cmd.join(" "))
    }

    async fn create_network(&self, env: &str, subnet: Ipv4Net) -> Result<(), RuntimeError> {
        let name = cilo_engine::network_name(env);
        let mut networks = self.networks.lock();
        match networks.get(&name) {
            Some(existing) if *existing == subnet => Ok(()),
            Some(existing) => Err(RuntimeError::NetworkCollision {
                name,
                detail: format!("exists with subnet {existing}"),
            }),
            None => {
                if networks.values().any(|n| cilo_core::subnet::overlaps(*n, subnet)) {
                    return Err(RuntimeError::NetworkCollision {
                        name,
                        detail: "subnet overlap".to_string(),
                    });
                }
                networks.insert(name, subnet);
                Ok(())
            }
        }
    }

    async fn remove_network(&self, env: &str) -> Result<(), RuntimeError> {
        self.networks.lock().remove(&cilo_engine::network_name(env));
        Ok(())
    }

    async fn list_owned_networks(&self) -> Result<Vec<String>, RuntimeError> {
        Ok(self.networks.lock().keys().cloned().collect())
    }
}
