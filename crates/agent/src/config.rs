// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration.

use ipnet::Ipv4Net;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// State root: peer map, workspaces, logs
    pub state_dir: PathBuf,
    /// Overlay interface name
    pub interface: String,
    /// WireGuard listen port
    pub listen_port: u16,
    /// HTTP API port (bound to the overlay address only)
    pub api_port: u16,
    /// The /24 this machine hands out to peers; the agent itself is `.1`
    pub peer_subnet: Ipv4Net,
    /// Keys allowed to open sessions
    pub authorized_keys: PathBuf,
    /// Container runtime override (`docker` / `podman`); autodetected when unset
    pub runtime: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("/var/cilo"),
            interface: "cilo0".to_string(),
            listen_port: 51820,
            api_port: 8440,
            peer_subnet: Ipv4Net::new(Ipv4Addr::new(10, 100, 0, 0), 24)
                .unwrap_or_else(|_| unreachable!("static /24 is valid")),
            authorized_keys: PathBuf::from("/root/.ssh/authorized_keys"),
            runtime: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("peer subnet {0} has no usable host addresses")]
    PeerSubnetTooSmall(Ipv4Net),
}

impl AgentConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
                toml::from_str(&content)
                    .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?
            }
            _ => Self::default(),
        };
        if let Ok(dir) = std::env::var("CILO_AGENT_STATE") {
            config.state_dir = PathBuf::from(dir);
        }
        config.overlay_address()?;
        Ok(config)
    }

    /// The agent's own overlay address: the first host of the peer subnet.
    pub fn overlay_address(&self) -> Result<Ipv4Addr, ConfigError> {
        cilo_core::subnet::nth_host(self.peer_subnet, 1)
            .ok_or(ConfigError::PeerSubnetTooSmall(self.peer_subnet))
    }

    /// Where the HTTP API binds. Overlay only; never a public interface.
    pub fn api_bind(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::from((self.overlay_address()?, self.api_port)))
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.state_dir.join("workspaces")
    }

    /// Overlay key material lives outside the workspace tree.
    pub fn wg_key_file(&self) -> PathBuf {
        self.state_dir.join("wg.key")
    }

    pub fn peer_map_path(&self) -> PathBuf {
        self.state_dir.join("peers.json")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
