// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server configuration.
//!
//! Loaded from a TOML file (all fields optional, defaults below), then
//! overridden by environment variables for the handful of fields that vary
//! between deployments.

use ipnet::Ipv4Net;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP bind address
    pub bind: SocketAddr,
    /// SQLite database path; `:memory:` for tests
    pub db_path: String,
    /// Range environment /24s are drawn from
    pub environment_cidr: Ipv4Net,
    /// Default per-machine peer subnet
    pub peer_subnet: Ipv4Net,
    /// DNS suffix environments are published under
    pub suffix: String,
    /// Team the bootstrap credential belongs to
    pub team_id: String,
    pub team_name: String,
    /// SSH private key used to authenticate to agents (and install them)
    pub ssh_key: Option<PathBuf>,
    pub pool: PoolConfig,
    pub cloud: Option<CloudConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Keep at least this many ready, unassigned machines
    pub min_ready: usize,
    /// Never exceed this many live machines
    pub max_total: usize,
    /// Seconds between reconcile ticks
    pub interval_secs: u64,
    /// Provisioning attempts before a machine is marked failed for good
    pub failure_ceiling: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloudConfig {
    /// Base URL of the machine API
    pub api_url: String,
    /// File holding the API token (kept out of the config file itself)
    pub token_file: PathBuf,
    /// Instance type passed through to the API
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
}

fn default_instance_type() -> String {
    "small".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            db_path: "/var/cilo/server.db".to_string(),
            environment_cidr: Ipv4Net::new(std::net::Ipv4Addr::new(10, 224, 0, 0), 16)
                .unwrap_or_else(|_| unreachable!("static /16 is valid")),
            peer_subnet: Ipv4Net::new(std::net::Ipv4Addr::new(10, 100, 0, 0), 24)
                .unwrap_or_else(|_| unreachable!("static /24 is valid")),
            suffix: "test".to_string(),
            team_id: "team-default".to_string(),
            team_name: "default".to_string(),
            ssh_key: None,
            pool: PoolConfig::default(),
            cloud: None,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { min_ready: 0, max_total: 5, interval_secs: 30, failure_ceiling: 5 }
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
}

impl ServerConfig {
    /// Load from a TOML file, then apply env overrides. A missing file is
    /// the default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::Read { path: path.to_path_buf(), source }
                })?;
                toml::from_str(&content).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(bind) = std::env::var("CILO_SERVER_BIND") {
            if let Ok(addr) = bind.parse() {
                self.bind = addr;
            }
        }
        if let Ok(db) = std::env::var("CILO_SERVER_DB") {
            self.db_path = db;
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
