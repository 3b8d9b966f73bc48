// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cilo connect` / `cilo disconnect` — the overlay driver sequence.
//!
//! Connect: keypair → key exchange → tunnel + routes → DNS render →
//! workspace transfer → agent bring-up → service report → DNS re-render.
//! Each step has a matching undo; a failure unwinds what came before it.

use super::{client, suffix};
use crate::agent::AgentSession;
use crate::auth_store::cilo_home;
use crate::client::{CliError, ServerClient};
use crate::exit_error::ExitError;
use crate::overlay::{self, Keypair, CLIENT_INTERFACE};
use crate::resolver::{render::render, upstreams};
use crate::transfer;
use cilo_core::{Environment, Origin, Service};
use cilo_wire::{CreateEnvironmentRequest, ExchangeRequest, SyncRequest, UpRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Active-connection record, persisted so `disconnect` knows which peer
/// key and interface belong to this client.
#[derive(Debug, Serialize, Deserialize)]
struct ConnectionRecord {
    environment_id: String,
    public_key: String,
    interface: String,
}

fn connection_path(env: &str) -> PathBuf {
    cilo_home().join("connections").join(format!("{env}.json"))
}

fn default_ssh_key() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".ssh").join("id_ed25519")
}

pub async fn connect(
    name: &str,
    path: Option<PathBuf>,
    ssh_key: Option<PathBuf>,
    project: Option<String>,
) -> Result<(), ExitError> {
    cilo_core::validate_name(name).map_err(|e| ExitError::new(2, e.to_string()))?;
    let client = client()?;
    let project_dir = match path {
        Some(path) => path,
        None => std::env::current_dir().map_err(|e| ExitError::generic(e.to_string()))?,
    };

    // Find or place the environment.
    let env = match client.environment_by_name(name).await {
        Ok(env) => env,
        Err(CliError::Api { status: 404, .. }) => {
            let response = client
                .create_environment(&CreateEnvironmentRequest {
                    name: name.to_string(),
                    project,
                    format: "compose".to_string(),
                    origin: Origin::Interactive,
                    ttl_seconds: None,
                })
                .await?;
            println!("environment {} placed on {}", name, response.machine_endpoint);
            response.environment
        }
        Err(e) => return Err(e.into()),
    };

    // Fresh keypair, exchange, tunnel.
    let keypair = Keypair::generate();
    let exchange = client
        .exchange(&ExchangeRequest {
            environment_id: env.id.to_string(),
            public_key: keypair.public_base64(),
        })
        .await?;
    let machine_ip = machine_overlay_address(&exchange.allowed_ips, exchange.assigned_ip)
        .ok_or_else(|| ExitError::generic("exchange response carried no peer subnet"))?;

    let mut tunnel = overlay::connect(CLIENT_INTERFACE, &keypair, &exchange)
        .await
        .map_err(|e| ExitError::generic(e.to_string()))?;

    let result = bring_up(&client, &env, &project_dir, ssh_key, machine_ip).await;
    match result {
        Ok(services) => {
            save_connection(&env, &keypair).map_err(|e| ExitError::generic(e.to_string()))?;
            refresh_resolver(&client).await?;
            println!("connected to {}:", env.name);
            for (service, ip) in &services {
                println!("  {service}.{}.{}  →  {ip}", env.name, suffix());
            }
            Ok(())
        }
        Err(e) => {
            // Undo in reverse: peer first, then the tunnel under it.
            let _ = client.remove_peer(&keypair.public_base64()).await;
            tunnel.teardown().await;
            Err(e)
        }
    }
}

/// Steps 5–8: DNS, transfer, agent bring-up, report.
async fn bring_up(
    client: &ServerClient,
    env: &Environment,
    project_dir: &Path,
    ssh_key: Option<PathBuf>,
    machine_ip: Ipv4Addr,
) -> Result<BTreeMap<String, Ipv4Addr>, ExitError> {
    refresh_resolver(client).await?;

    client.sync_environment(&env.id, &SyncRequest::default()).await?;

    let key_path = ssh_key.unwrap_or_else(default_ssh_key);
    let agent = AgentSession::connect(machine_ip, &key_path).await?;
    agent.sync_ack(&env.name).await?;

    transfer::transfer(
        project_dir,
        machine_ip,
        &env.name,
        transfer::DEFAULT_TRANSFER_TIMEOUT,
    )
    .await
    .map_err(|e| ExitError::generic(e.to_string()))?;

    let up = agent
        .up(&env.name, &UpRequest { subnet: env.subnet, build: false, recreate: false })
        .await?;

    let services = service_records(project_dir, &up.services);
    client.sync_environment(&env.id, &SyncRequest { services: Some(services) }).await?;
    Ok(up.services)
}

pub async fn disconnect(name: &str) -> Result<(), ExitError> {
    let client = client()?;
    let record_path = connection_path(name);
    let record: Option<ConnectionRecord> = std::fs::read_to_string(&record_path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok());

    match record {
        Some(record) => {
            if let Err(e) = client.remove_peer(&record.public_key).await {
                tracing::warn!(error = %e, "peer removal failed; tearing tunnel down anyway");
            }
            let mut tunnel = overlay::Tunnel::for_teardown(&record.interface);
            tunnel.teardown().await;
            let _ = std::fs::remove_file(&record_path);
        }
        None => {
            println!("no active connection for {name}");
        }
    }

    refresh_resolver(&client).await?;
    Ok(())
}

/// Regenerate the resolver config from the server's environment list.
pub(crate) async fn refresh_resolver(client: &ServerClient) -> Result<(), ExitError> {
    let environments = client.list_environments().await?;
    let upstreams = upstreams::discover().await;
    let config = render(&environments, &suffix(), &upstreams)
        .map_err(|e| ExitError::generic(e.to_string()))?;
    crate::resolver::install_config(&cilo_home(), &config)
        .map_err(|e| ExitError::generic(e.to_string()))?;
    Ok(())
}

/// The machine's overlay address: the `.1` of whichever allowed network
/// contains our assigned peer address.
fn machine_overlay_address(
    allowed: &[ipnet::Ipv4Net],
    assigned: Ipv4Addr,
) -> Option<Ipv4Addr> {
    let peer_net = allowed.iter().find(|net| net.contains(&assigned))?;
    cilo_core::subnet::nth_host(*peer_net, 1)
}

/// Merge the runtime's service→IP map with the locally parsed project to
/// recover ingress flags, ports, and custom hostnames.
fn service_records(
    project_dir: &Path,
    addresses: &BTreeMap<String, Ipv4Addr>,
) -> Vec<Service> {
    let desc = cilo_engine::ParserRegistry::with_defaults().parse(project_dir).ok();
    addresses
        .iter()
        .map(|(name, ip)| {
            let spec = desc.as_ref().and_then(|d| d.service(name));
            Service {
                name: name.clone(),
                image: spec.and_then(|s| s.image.clone()),
                ip: Some(*ip),
                ports: spec
                    .map(|s| s.ports.iter().map(|p| p.to_string()).collect())
                    .unwrap_or_default(),
                ingress: spec.map(|s| s.is_ingress()).unwrap_or(false),
                hostnames: spec.map(|s| s.extra_hostnames()).unwrap_or_default(),
            }
        })
        .collect()
}

fn save_connection(env: &Environment, keypair: &Keypair) -> std::io::Result<()> {
    let path = connection_path(&env.name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let record = ConnectionRecord {
        environment_id: env.id.to_string(),
        public_key: keypair.public_base64(),
        interface: CLIENT_INTERFACE.to_string(),
    };
    std::fs::write(path, serde_json::to_string_pretty(&record).unwrap_or_default())
}

#[cfg(test)]
#[path = "connect_tests.rs"]
mod tests;
