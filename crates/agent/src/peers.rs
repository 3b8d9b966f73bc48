// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent peer map: WireGuard public key → assigned overlay IP.
//!
//! The agent owns the machine's peer subnet. Assignments are monotonic in
//! the low octet (`.2` up; `.1` is the agent) and never wrap — a freed
//! octet stays burned until the map file is recreated, so a key can never
//! inherit another peer's address. The file is written via temp + rename
//! under a process-exclusive lock; external editors are not supported.

use fs2::FileExt;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// First allocatable low octet; `.1` is the agent's own address.
const FIRST_OCTET: u32 = 2;
/// Last allocatable low octet in a /24.
const LAST_OCTET: u32 = 254;

#[derive(Debug, Error)]
pub enum PeerMapError {
    #[error("peer subnet exhausted (no octets left below {LAST_OCTET})")]
    Exhausted,
    #[error("peer map is locked by another process")]
    Locked,
    #[error("peer map corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PeersFile {
    /// Next low octet to hand out; never decreases
    #[serde(default = "default_next_octet")]
    next_octet: u32,
    #[serde(default)]
    peers: BTreeMap<String, Ipv4Addr>,
}

fn default_next_octet() -> u32 {
    FIRST_OCTET
}

#[derive(Debug)]
pub struct PeerMap {
    path: PathBuf,
    subnet: Ipv4Net,
    state: PeersFile,
    /// Held for the process lifetime; dropping releases the lock
    _lock: std::fs::File,
}

impl PeerMap {
    /// Load (or initialize) the map at `path`, taking the sidecar lock.
    pub fn open(path: impl Into<PathBuf>, subnet: Ipv4Net) -> Result<Self, PeerMapError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock_path = path.with_extension("lock");
        let lock = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock.try_lock_exclusive().map_err(|_| PeerMapError::Locked)?;

        let state = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| PeerMapError::Corrupt(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PeersFile {
                next_octet: FIRST_OCTET,
                peers: BTreeMap::new(),
            },
            Err(e) => return Err(e.into()),
        };

        Ok(Self { path, subnet, state, _lock: lock })
    }

    /// Assign (or return the existing) address for a key.
    pub fn allocate(&mut self, public_key: &str) -> Result<Ipv4Addr, PeerMapError> {
        if let Some(ip) = self.state.peers.get(public_key) {
            // Re-exchange with a known key converges on the same address
            return Ok(*ip);
        }
        if self.state.next_octet > LAST_OCTET {
            return Err(PeerMapError::Exhausted);
        }
        let ip = cilo_core::subnet::nth_host(self.subnet, self.state.next_octet)
            .ok_or(PeerMapError::Exhausted)?;
        self.state.next_octet += 1;
        self.state.peers.insert(public_key.to_string(), ip);
        self.persist()?;
        Ok(ip)
    }

    /// Remove a key; its octet is not reused.
    pub fn remove(&mut self, public_key: &str) -> Result<Option<Ipv4Addr>, PeerMapError> {
        let removed = self.state.peers.remove(public_key);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn get(&self, public_key: &str) -> Option<Ipv4Addr> {
        self.state.peers.get(public_key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Ipv4Addr)> {
        self.state.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.state.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.peers.is_empty()
    }

    /// Temp-file + rename so a crash mid-write leaves the old map intact.
    fn persist(&self) -> Result<(), PeerMapError> {
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&self.state)
            .map_err(|e| PeerMapError::Corrupt(e.to_string()))?;
        write_private(&tmp, &content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    std::fs::write(path, content)
}

#[cfg(test)]
#[path = "peers_tests.rs"]
mod tests;
