// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-resolver integration (the one-time privileged `install` step).
//!
//! Two host classes: systemd-resolved hosts get a drop-in under
//! `/etc/systemd/resolved.conf.d/` delegating the suffix to our loopback
//! resolver; resolver-directory hosts get `/etc/resolver/<suffix>`.

use super::{ResolverError, RESOLVER_PORT};
use cilo_engine::subprocess::run_checked;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostClass {
    /// systemd-resolved with conf.d drop-ins
    SystemdResolved,
    /// `/etc/resolver/<suffix>` files
    ResolverDir,
}

impl HostClass {
    /// Pick by what the host actually has.
    pub fn detect() -> Self {
        if Path::new("/run/systemd/resolve").is_dir()
            || Path::new("/etc/systemd/resolved.conf").exists()
        {
            HostClass::SystemdResolved
        } else {
            HostClass::ResolverDir
        }
    }
}

/// Drop-in content for systemd-resolved hosts.
pub fn resolved_dropin(suffix: &str, port: u16) -> String {
    format!("# generated by cilo install\n[Resolve]\nDNS=127.0.0.1:{port}\nDomains=~{suffix}\n")
}

/// `/etc/resolver/<suffix>` content.
pub fn resolver_dir_file(port: u16) -> String {
    format!("nameserver 127.0.0.1\nport {port}\n")
}

/// Where the integration file lands for a host class.
pub fn integration_path(class: HostClass, suffix: &str) -> PathBuf {
    match class {
        HostClass::SystemdResolved => {
            PathBuf::from("/etc/systemd/resolved.conf.d/cilo.conf")
        }
        HostClass::ResolverDir => PathBuf::from("/etc/resolver").join(suffix),
    }
}

/// Install the host integration. Requires privilege; idempotent.
pub async fn install(class: HostClass, suffix: &str) -> Result<(), ResolverError> {
    let path = integration_path(class, suffix);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = match class {
        HostClass::SystemdResolved => resolved_dropin(suffix, RESOLVER_PORT),
        HostClass::ResolverDir => resolver_dir_file(RESOLVER_PORT),
    };
    std::fs::write(&path, content)?;

    if class == HostClass::SystemdResolved {
        // Reload, not restart: in-flight queries keep their answers
        run_checked(
            "systemctl",
            &["reload-or-restart", "systemd-resolved"],
            Duration::from_secs(30),
            "systemd-resolved reload",
        )
        .await
        .map_err(|e| ResolverError::Reload(e.to_string()))?;
    }
    tracing::info!(path = %path.display(), "host resolver integration installed");
    Ok(())
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
