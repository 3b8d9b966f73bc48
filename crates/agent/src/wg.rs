// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WireGuard interface management via `wg` / `ip` subprocesses.
//!
//! All mutations are idempotent: interface and address creation tolerate
//! "already exists", and `wg set peer` is naturally upsert-shaped.

use crate::error::AgentError;
use cilo_engine::subprocess::{run_checked, SubprocessError, DEFAULT_TIMEOUT};
use cilo_wire::{AgentWgPeer, AgentWgStatus};
use std::net::Ipv4Addr;
use std::path::PathBuf;

pub struct WgInterface {
    name: String,
    listen_port: u16,
    key_file: PathBuf,
}

impl WgInterface {
    pub fn new(name: impl Into<String>, listen_port: u16, key_file: PathBuf) -> Self {
        Self { name: name.into(), listen_port, key_file }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bring the interface up with its key, port, and address. Safe to run
    /// on every boot.
    pub async fn ensure(&self, address: Ipv4Addr, prefix_len: u8) -> Result<(), AgentError> {
        self.ensure_key().await?;

        tolerate_exists(
            run_checked(
                "ip",
                &["link", "add", &self.name, "type", "wireguard"],
                DEFAULT_TIMEOUT,
                "ip link add",
            )
            .await,
        )?;

        let port = self.listen_port.to_string();
        let key_file = self.key_file.display().to_string();
        run_checked(
            "wg",
            &["set", &self.name, "private-key", &key_file, "listen-port", &port],
            DEFAULT_TIMEOUT,
            "wg set interface",
        )
        .await
        .map_err(overlay_err)?;

        let cidr = format!("{address}/{prefix_len}");
        tolerate_exists(
            run_checked(
                "ip",
                &["addr", "add", &cidr, "dev", &self.name],
                DEFAULT_TIMEOUT,
                "ip addr add",
            )
            .await,
        )?;

        run_checked("ip", &["link", "set", &self.name, "up"], DEFAULT_TIMEOUT, "ip link up")
            .await
            .map_err(overlay_err)?;
        tracing::info!(interface = %self.name, %cidr, port = self.listen_port, "overlay up");
        Ok(())
    }

    /// Generate and persist the private key if it does not exist (0600).
    async fn ensure_key(&self) -> Result<(), AgentError> {
        if self.key_file.exists() {
            return Ok(());
        }
        if let Some(parent) = self.key_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let key = run_checked("wg", &["genkey"], DEFAULT_TIMEOUT, "wg genkey")
            .await
            .map_err(overlay_err)?;
        write_key(&self.key_file, &key)?;
        tracing::info!(key_file = %self.key_file.display(), "generated overlay private key");
        Ok(())
    }

    pub async fn public_key(&self) -> Result<String, AgentError> {
        run_checked(
            "wg",
            &["show", &self.name, "public-key"],
            DEFAULT_TIMEOUT,
            "wg show public-key",
        )
        .await
        .map_err(overlay_err)
    }

    /// Authorize a peer key for exactly its assigned /32.
    pub async fn add_peer(&self, public_key: &str, ip: Ipv4Addr) -> Result<(), AgentError> {
        let allowed = format!("{ip}/32");
        run_checked(
            "wg",
            &["set", &self.name, "peer", public_key, "allowed-ips", &allowed],
            DEFAULT_TIMEOUT,
            "wg set peer",
        )
        .await
        .map_err(overlay_err)?;
        Ok(())
    }

    pub async fn remove_peer(&self, public_key: &str) -> Result<(), AgentError> {
        let result = run_checked(
            "wg",
            &["set", &self.name, "peer", public_key, "remove"],
            DEFAULT_TIMEOUT,
            "wg remove peer",
        )
        .await;
        match result {
            Ok(_) => Ok(()),
            // Unknown peer: removal is idempotent
            Err(SubprocessError::Failed { stderr, .. }) if stderr.contains("No such peer") => {
                Ok(())
            }
            Err(e) => Err(overlay_err(e)),
        }
    }

    pub async fn status(&self) -> Result<AgentWgStatus, AgentError> {
        let dump = run_checked("wg", &["show", &self.name, "dump"], DEFAULT_TIMEOUT, "wg dump")
            .await
            .map_err(overlay_err)?;
        let (public_key, peers) = parse_dump(&dump);
        Ok(AgentWgStatus { interface: self.name.clone(), public_key, peers })
    }
}

fn overlay_err(e: SubprocessError) -> AgentError {
    AgentError::Overlay(e.to_string())
}

fn tolerate_exists(result: Result<String, SubprocessError>) -> Result<(), AgentError> {
    match result {
        Ok(_) => Ok(()),
        Err(SubprocessError::Failed { stderr, .. })
            if stderr.contains("File exists") || stderr.contains("already exists") =>
        {
            Ok(())
        }
        Err(e) => Err(overlay_err(e)),
    }
}

#[cfg(unix)]
fn write_key(path: &std::path::Path, key: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .mode(0o600)
        .open(path)?;
    writeln!(file, "{key}")
}

#[cfg(not(unix))]
fn write_key(path: &std::path::Path, key: &str) -> std::io::Result<()> {
    std::fs::write(path, format!("{key}\n"))
}

/// Parse `wg show <iface> dump`: a tab-separated header line
/// (private-key, public-key, listen-port, fwmark) followed by one line per
/// peer (public-key, psk, endpoint, allowed-ips, handshake, rx, tx,
/// keepalive).
pub fn parse_dump(dump: &str) -> (String, Vec<AgentWgPeer>) {
    let mut lines = dump.lines();
    let public_key = lines
        .next()
        .and_then(|header| header.split('\t').nth(1))
        .unwrap_or_default()
        .to_string();

    let peers = lines
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let key = *fields.first()?;
            if key.is_empty() {
                return None;
            }
            Some(AgentWgPeer {
                public_key: key.to_string(),
                allowed_ips: fields
                    .get(3)
                    .map(|ips| {
                        ips.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty() && *s != "(none)")
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                last_handshake: fields
                    .get(4)
                    .and_then(|ts| ts.parse::<u64>().ok())
                    .filter(|ts| *ts > 0),
            })
        })
        .collect();

    (public_key, peers)
}

#[cfg(test)]
#[path = "wg_tests.rs"]
mod tests;
