// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side overlay driver.
//!
//! Generates a fresh X25519 keypair in memory (the private key never
//! touches disk except as a 0600 temp file handed to `wg`), installs the
//! local tunnel with the server as its only peer, and routes the
//! environment subnet through it. Every step records an undo; failure or
//! disconnect unwinds in reverse order.

use crate::client::CliError;
use base64::Engine as _;
use cilo_engine::subprocess::{run_checked, SubprocessError, DEFAULT_TIMEOUT};
use cilo_wire::ExchangeResponse;
use ipnet::Ipv4Net;
use rand::rngs::OsRng;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

/// Default client-side interface name.
pub const CLIENT_INTERFACE: &str = "cilo0";

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("overlay setup failed at {step}: {detail}")]
    Setup { step: &'static str, detail: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<OverlayError> for CliError {
    fn from(e: OverlayError) -> Self {
        CliError::Transport(e.to_string())
    }
}

/// Fresh Curve25519 keypair, held in memory only.
pub struct Keypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl Keypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.public.as_bytes())
    }

    fn private_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.secret.to_bytes())
    }
}

/// An established tunnel; tear down with [`Tunnel::teardown`].
pub struct Tunnel {
    interface: String,
    routes: Vec<Ipv4Net>,
}

/// Bring the tunnel up per the exchange response.
pub async fn connect(
    interface: &str,
    keypair: &Keypair,
    exchange: &ExchangeResponse,
) -> Result<Tunnel, OverlayError> {
    let mut tunnel = Tunnel { interface: interface.to_string(), routes: Vec::new() };

    if let Err(e) = establish(interface, keypair, exchange, &mut tunnel).await {
        // Partial failure unwinds whatever was created.
        tunnel.teardown().await;
        return Err(e);
    }
    Ok(tunnel)
}

async fn establish(
    interface: &str,
    keypair: &Keypair,
    exchange: &ExchangeResponse,
    tunnel: &mut Tunnel,
) -> Result<(), OverlayError> {
    let step = |step: &'static str| move |e: SubprocessError| OverlayError::Setup {
        step,
        detail: e.to_string(),
    };

    run_checked(
        "ip",
        &["link", "add", interface, "type", "wireguard"],
        DEFAULT_TIMEOUT,
        "ip link add",
    )
    .await
    .map_err(step("link add"))?;

    // The private key reaches wg via a 0600 temp file that dies with scope
    let key_file = write_key_tempfile(&keypair.private_base64())?;
    let key_path = key_file.path().display().to_string();
    run_checked(
        "wg",
        &["set", interface, "private-key", &key_path],
        DEFAULT_TIMEOUT,
        "wg set private-key",
    )
    .await
    .map_err(step("private key"))?;

    let address = format!("{}/32", exchange.assigned_ip);
    run_checked("ip", &["addr", "add", &address, "dev", interface], DEFAULT_TIMEOUT, "ip addr")
        .await
        .map_err(step("address"))?;

    let allowed: Vec<String> = exchange.allowed_ips.iter().map(|n| n.to_string()).collect();
    let allowed = allowed.join(",");
    run_checked(
        "wg",
        &[
            "set",
            interface,
            "peer",
            &exchange.machine_public_key,
            "endpoint",
            &exchange.endpoint,
            "allowed-ips",
            &allowed,
            "persistent-keepalive",
            "25",
        ],
        DEFAULT_TIMEOUT,
        "wg set peer",
    )
    .await
    .map_err(step("peer"))?;

    run_checked("ip", &["link", "set", interface, "up"], DEFAULT_TIMEOUT, "ip link up")
        .await
        .map_err(step("link up"))?;

    for net in &exchange.allowed_ips {
        let prefix = net.to_string();
        match run_checked(
            "ip",
            &["route", "add", &prefix, "dev", interface],
            DEFAULT_TIMEOUT,
            "ip route add",
        )
        .await
        {
            Ok(_) => tunnel.routes.push(*net),
            Err(SubprocessError::Failed { stderr, .. }) if stderr.contains("File exists") => {
                tunnel.routes.push(*net);
            }
            Err(e) => return Err(step("route")(e)),
        }
    }

    tracing::info!(
        interface,
        address = %exchange.assigned_ip,
        endpoint = %exchange.endpoint,
        "tunnel up"
    );
    Ok(())
}

impl Tunnel {
    /// Handle over an interface recorded by a previous run, for teardown
    /// only (deleting the link drops its routes too).
    pub fn for_teardown(interface: &str) -> Self {
        Self { interface: interface.to_string(), routes: Vec::new() }
    }

    /// Undo in reverse order. Deleting the link also drops its routes and
    /// address, so explicit route removal is only best-effort hygiene.
    pub async fn teardown(&mut self) {
        for net in self.routes.drain(..).rev() {
            let prefix = net.to_string();
            let _ = run_checked(
                "ip",
                &["route", "del", &prefix, "dev", &self.interface],
                DEFAULT_TIMEOUT,
                "ip route del",
            )
            .await;
        }
        let _ = run_checked(
            "ip",
            &["link", "del", &self.interface],
            DEFAULT_TIMEOUT,
            "ip link del",
        )
        .await;
        tracing::info!(interface = %self.interface, "tunnel down");
    }
}

fn write_key_tempfile(key: &str) -> Result<tempfile::NamedTempFile, OverlayError> {
    use std::io::Write;
    let mut builder = tempfile::Builder::new();
    builder.prefix(".cilo-wg-");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        let file = builder.tempfile()?;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600))?;
        let mut file = file;
        writeln!(file, "{key}")?;
        return Ok(file);
    }
    #[cfg(not(unix))]
    {
        let mut file = builder.tempfile()?;
        writeln!(file, "{key}")?;
        Ok(file)
    }
}

#[cfg(test)]
#[path = "overlay_tests.rs"]
mod tests;
