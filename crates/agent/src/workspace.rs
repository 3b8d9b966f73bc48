// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace store: one project tree per environment under the state root.
//!
//! Mutated only by the sync process; the engine reads it. Names are
//! validated before they ever become a path component.

use crate::error::AgentError;
use cilo_core::validate_name;
use std::path::{Path, PathBuf};

pub struct WorkspaceStore {
    root: PathBuf,
}

impl WorkspaceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for an environment's workspace; rejects invalid names before
    /// they reach the filesystem.
    pub fn path_for(&self, env: &str) -> Result<PathBuf, AgentError> {
        validate_name(env)?;
        Ok(self.root.join(env))
    }

    pub fn exists(&self, env: &str) -> Result<bool, AgentError> {
        Ok(self.path_for(env)?.is_dir())
    }

    pub async fn ensure(&self, env: &str) -> Result<PathBuf, AgentError> {
        let path = self.path_for(env)?;
        tokio::fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// Environment names that currently have a workspace.
    pub fn list(&self) -> Result<Vec<String>, AgentError> {
        let mut names = Vec::new();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove the tree; already-gone is success.
    pub async fn remove(&self, env: &str) -> Result<(), AgentError> {
        let path = self.path_for(env)?;
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
