// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with timeouts and captured output.
//!
//! Every external tool the engine and its callers shell out to (`docker`,
//! `podman`, `wg`, `ip`, `iptables`, `rsync`, ...) goes through here so
//! that no invocation can hang a request handler and every failure carries
//! the tool's stderr.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default ceiling for short-lived tool invocations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Compose bring-up may pull images; it gets a longer leash.
pub const UP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to spawn {label}: {source}")]
    Spawn {
        label: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{label} timed out after {seconds}s")]
    Timeout { label: String, seconds: u64 },
    #[error("{label} failed: {stderr}")]
    Failed { label: String, stderr: String },
}

/// Run a command to completion with a deadline, returning the raw output.
///
/// The child is killed when the deadline passes. Non-zero exit is not an
/// error here; use [`run_checked`] for that.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    let fut = cmd.output();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Spawn { label: label.to_string(), source }),
        Err(_) => Err(SubprocessError::Timeout {
            label: label.to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}

/// Run `program args...`, requiring exit 0; returns trimmed stdout.
pub async fn run_checked(
    program: &str,
    args: &[&str],
    timeout: Duration,
    label: &str,
) -> Result<String, SubprocessError> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    let output = run_with_timeout(cmd, timeout, label).await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(SubprocessError::Failed { label: label.to_string(), stderr })
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
