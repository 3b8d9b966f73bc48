// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted client credentials: `~/.cilo/cloud-auth.json`.
//!
//! The directory is 0700 and the file 0600. A file missing either the
//! server URL or the API key is treated as absent, not as an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthStoreError {
    #[error("not logged in; run `cilo auth login` first")]
    Missing,
    #[error("auth store corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudAuth {
    pub server: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

/// `~/.cilo`, overridable for tests via `CILO_HOME`.
pub fn cilo_home() -> PathBuf {
    if let Ok(home) = std::env::var("CILO_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".cilo")
}

fn auth_path(home: &Path) -> PathBuf {
    home.join("cloud-auth.json")
}

/// Load stored credentials; incomplete files count as missing.
pub fn load(home: &Path) -> Result<CloudAuth, AuthStoreError> {
    let content = match std::fs::read_to_string(auth_path(home)) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AuthStoreError::Missing)
        }
        Err(e) => return Err(e.into()),
    };
    let auth: CloudAuth =
        serde_json::from_str(&content).map_err(|e| AuthStoreError::Corrupt(e.to_string()))?;
    if auth.server.is_empty() || auth.api_key.is_empty() {
        return Err(AuthStoreError::Missing);
    }
    Ok(auth)
}

/// Persist credentials with private permissions.
pub fn save(home: &Path, auth: &CloudAuth) -> Result<(), AuthStoreError> {
    create_private_dir(home)?;
    let content = serde_json::to_string_pretty(auth)
        .map_err(|e| AuthStoreError::Corrupt(e.to_string()))?;
    write_private(&auth_path(home), &content)?;
    Ok(())
}

pub fn clear(home: &Path) -> Result<(), AuthStoreError> {
    match std::fs::remove_file(auth_path(home)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    match std::fs::DirBuilder::new().recursive(true).mode(0o700).create(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
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
    file.write_all(content.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    std::fs::write(path, content)
}

#[cfg(test)]
#[path = "auth_store_tests.rs"]
mod tests;
