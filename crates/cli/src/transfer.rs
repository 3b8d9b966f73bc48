// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace transfer: rsync over SSH through the overlay, with a
//! `tar | ssh tar -x` fallback when rsync is unavailable on either end.
//!
//! The exclude set is fixed (VCS metadata, dependency caches, build
//! outputs, editor litter); a project-local `.ciloignore` adds to it but
//! can never remove from it.

use cilo_engine::subprocess::{run_checked, run_with_timeout};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Always excluded from transfer.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".DS_Store",
    "*.swp",
    ".idea",
    ".vscode",
    ".cilo.override.yaml",
];

/// Project-local additive ignore file.
pub const IGNORE_FILE: &str = ".ciloignore";

/// No fixed upper bound on transfer size; callers pick the deadline.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(600);

const SSH_OPTS: &str = "ssh -o BatchMode=yes -o StrictHostKeyChecking=accept-new";

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("workspace transfer failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The exclude patterns for a project: the fixed set plus `.ciloignore`.
pub fn exclude_patterns(project_dir: &Path) -> Vec<String> {
    let mut patterns: Vec<String> =
        DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect();
    if let Ok(content) = std::fs::read_to_string(project_dir.join(IGNORE_FILE)) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if !patterns.iter().any(|p| p == line) {
                patterns.push(line.to_string());
            }
        }
    }
    patterns
}

/// Push `project_dir` to the machine's workspace for `env`.
pub async fn transfer(
    project_dir: &Path,
    machine_ip: Ipv4Addr,
    env: &str,
    timeout: Duration,
) -> Result<(), TransferError> {
    let excludes = exclude_patterns(project_dir);
    match rsync(project_dir, machine_ip, env, &excludes, timeout).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, "rsync failed; falling back to tar over ssh");
            tar_pipeline(project_dir, machine_ip, env, &excludes, timeout).await
        }
    }
}

async fn rsync(
    project_dir: &Path,
    machine_ip: Ipv4Addr,
    env: &str,
    excludes: &[String],
    timeout: Duration,
) -> Result<(), TransferError> {
    let source = format!("{}/", project_dir.display());
    let target = format!("root@{machine_ip}:/var/cilo/workspaces/{env}/");
    let mut args: Vec<String> =
        vec!["-az".into(), "--delete".into(), "-e".into(), SSH_OPTS.into()];
    for pattern in excludes {
        args.push(format!("--exclude={pattern}"));
    }
    args.push(source);
    args.push(target);

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    run_checked("rsync", &arg_refs, timeout, "rsync")
        .await
        .map(|_| ())
        .map_err(|e| TransferError::Failed(e.to_string()))
}

async fn tar_pipeline(
    project_dir: &Path,
    machine_ip: Ipv4Addr,
    env: &str,
    excludes: &[String],
    timeout: Duration,
) -> Result<(), TransferError> {
    let excludes_args: String = excludes
        .iter()
        .map(|p| format!("--exclude='{p}'"))
        .collect::<Vec<_>>()
        .join(" ");
    let pipeline = format!(
        "tar -C '{}' {excludes_args} -cf - . | {SSH_OPTS} root@{machine_ip} \
         \"mkdir -p /var/cilo/workspaces/{env} && tar -C /var/cilo/workspaces/{env} -xf -\"",
        project_dir.display()
    );

    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(&pipeline);
    let output = run_with_timeout(cmd, timeout, "tar transfer")
        .await
        .map_err(|e| TransferError::Failed(e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TransferError::Failed(stderr.trim().to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
