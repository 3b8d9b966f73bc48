// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Name-resolution plane.
//!
//! A local forwarding resolver (dnsmasq-compatible) listens on loopback;
//! its configuration is regenerated from scratch from the server's
//! environment list on every change — never patched — written via temp +
//! rename, and the resolver is told to reload with SIGHUP. Non-`.suffix`
//! queries forward to the host's real upstreams.

pub mod host;
pub mod render;
pub mod upstreams;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Loopback port the forwarding resolver listens on.
pub const RESOLVER_PORT: u16 = 5354;

/// Config and pidfile names under the cilo home.
pub const CONFIG_FILE: &str = "resolver.conf";
pub const PID_FILE: &str = "resolver.pid";

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("name {name} resolves to both {first} and {second}")]
    Conflict { name: String, first: String, second: String },
    #[error("resolver reload failed: {0}")]
    Reload(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE)
}

/// Write the rendered config atomically and reload the resolver.
pub fn install_config(home: &Path, content: &str) -> Result<(), ResolverError> {
    std::fs::create_dir_all(home)?;
    let path = config_path(home);
    let tmp = path.with_extension("conf.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, &path)?;
    reload(home)
}

/// SIGHUP the resolver named in the pidfile; reload, never restart. A
/// missing pidfile just means no resolver is running yet.
pub fn reload(home: &Path) -> Result<(), ResolverError> {
    let pid_path = home.join(PID_FILE);
    let content = match std::fs::read_to_string(&pid_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let pid: i32 = content
        .trim()
        .parse()
        .map_err(|_| ResolverError::Reload(format!("bad pidfile {}", pid_path.display())))?;

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        kill(Pid::from_raw(pid), Signal::SIGHUP)
            .map_err(|e| ResolverError::Reload(format!("signal pid {pid}: {e}")))?;
    }
    tracing::debug!(pid, "resolver reloaded");
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
