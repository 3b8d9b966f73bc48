// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud provider: machines created and destroyed through a REST API.
//!
//! The API shape is deliberately small (create / get / delete / list
//! servers with a bearer token); vendor specifics stay behind this module.

use super::{manual::install_agent, MachineProvider, ProviderError, ProvisionedMachine};
use crate::config::CloudConfig;
use async_trait::async_trait;
use cilo_core::Machine;
use serde::Deserialize;
use std::time::Duration;

/// Default WireGuard listen port on provisioned machines.
const WG_PORT: u16 = 51820;
/// How long to wait for an instance to become active.
const ACTIVE_TIMEOUT: Duration = Duration::from_secs(300);
const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ServerResource {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    public_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerList {
    servers: Vec<ServerResource>,
}

pub struct CloudProvider {
    http: reqwest::Client,
    api_url: String,
    token: String,
    instance_type: String,
    /// Our WireGuard public key, authorized on every machine at install
    server_public_key: Option<String>,
}

impl CloudProvider {
    pub fn new(config: &CloudConfig, server_public_key: Option<String>) -> Result<Self, ProviderError> {
        let token = std::fs::read_to_string(&config.token_file)
            .map_err(|e| ProviderError::Api(format!("reading {}: {e}", config.token_file.display())))?
            .trim()
            .to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token,
            instance_type: config.instance_type.clone(),
            server_public_key,
        })
    }

    async fn get_server(&self, id: &str) -> Result<ServerResource, ProviderError> {
        let response = self
            .http
            .get(format!("{}/servers/{id}", self.api_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ProviderError::Api(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ProviderError::Api(format!("get server {id}: {}", response.status())));
        }
        response.json().await.map_err(|e| ProviderError::Api(e.to_string()))
    }

    /// Poll until the instance reports active with an address.
    async fn wait_active(&self, id: &str) -> Result<String, ProviderError> {
        let deadline = tokio::time::Instant::now() + ACTIVE_TIMEOUT;
        loop {
            let server = self.get_server(id).await?;
            if server.status == "active" {
                if let Some(ip) = server.public_ip {
                    return Ok(ip);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ProviderError::Timeout(format!(
                    "server {id} still {} after {}s",
                    server.status,
                    ACTIVE_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl MachineProvider for CloudProvider {
    fn name(&self) -> &'static str {
        "cloud"
    }

    async fn provision(&self) -> Result<ProvisionedMachine, ProviderError> {
        let response = self
            .http
            .post(format!("{}/servers", self.api_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "name": format!("cilo-{}", cilo_core::short(&nanoid_lower(), 8)),
                "type": self.instance_type,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Api(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ProviderError::Api(format!("create server: {}", response.status())));
        }
        let server: ServerResource =
            response.json().await.map_err(|e| ProviderError::Api(e.to_string()))?;

        let address = self.wait_active(&server.id).await?;
        let public_key =
            install_agent(&address, "root", self.server_public_key.as_deref()).await?;

        Ok(ProvisionedMachine {
            instance_id: server.id,
            address: address.clone(),
            endpoint: format!("{address}:{WG_PORT}"),
            public_key,
        })
    }

    async fn destroy(&self, machine: &Machine) -> Result<(), ProviderError> {
        // The instance id travels in the address-keyed list; look it up.
        let servers = self.list_servers().await?;
        let Some(server) = servers.iter().find(|s| s.public_ip.as_deref() == Some(&machine.address))
        else {
            // Already gone provider-side; treat as done.
            return Ok(());
        };
        let response = self
            .http
            .delete(format!("{}/servers/{}", self.api_url, server.id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ProviderError::Api(e.to_string()))?;
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(ProviderError::Api(format!("delete server: {}", response.status())));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.list_servers().await?.into_iter().map(|s| s.id).collect())
    }

    async fn health(&self) -> Result<(), ProviderError> {
        self.list_servers().await.map(|_| ())
    }
}

impl CloudProvider {
    async fn list_servers(&self) -> Result<Vec<ServerResource>, ProviderError> {
        let response = self
            .http
            .get(format!("{}/servers", self.api_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ProviderError::Api(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ProviderError::Api(format!("list servers: {}", response.status())));
        }
        let list: ServerList =
            response.json().await.map_err(|e| ProviderError::Api(e.to_string()))?;
        Ok(list.servers)
    }
}

fn nanoid_lower() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..12).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect()
}
