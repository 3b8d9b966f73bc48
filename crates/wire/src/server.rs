// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client ↔ control-server request/response bodies (`/v1/...`).

use chrono::{DateTime, Utc};
use cilo_core::{Environment, Machine, Origin, Scope, Service};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEnvironmentRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Project format tag; defaults to `compose`
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub origin: Origin,
    /// Auto-destroy after this many seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

fn default_format() -> String {
    "compose".to_string()
}

/// Returned with 202; terminal status is observed via GET.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEnvironmentResponse {
    pub environment: Environment,
    /// Where the assigned machine's overlay listens
    pub machine_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentList {
    pub environments: Vec<Environment>,
}

/// Body of `POST /v1/environments/:id/sync`. Without services it marks
/// the workspace transfer started; with them it reports the observed
/// service→IP map after bring-up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<Service>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub team_id: String,
    pub team_name: String,
    pub scope: Scope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateKeyRequest {
    #[serde(default)]
    pub scope: Scope,
}

/// The only response that ever carries a raw secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateKeyResponse {
    pub id: String,
    pub secret: String,
    pub prefix: String,
    pub scope: Scope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEntry {
    pub id: String,
    pub prefix: String,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterMachineRequest {
    pub address: String,
    /// Overlay endpoint `host:port`
    pub endpoint: String,
    /// Machine WireGuard public key (base64)
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_subnet: Option<Ipv4Net>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineList {
    pub machines: Vec<Machine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub environment_id: String,
    /// Client WireGuard public key (base64)
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeResponse {
    /// Address assigned to this peer out of the machine's peer subnet
    pub assigned_ip: Ipv4Addr,
    /// The machine's WireGuard public key (base64)
    pub machine_public_key: String,
    /// Overlay endpoint `host:port`
    pub endpoint: String,
    /// Networks to route through the tunnel (environment subnet + peer subnet)
    pub allowed_ips: Vec<Ipv4Net>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireguardPeerStatus {
    pub public_key: String,
    pub ip: Ipv4Addr,
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireguardStatus {
    pub environment_id: String,
    pub peers: Vec<WireguardPeerStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub version: String,
    pub machines_ready: usize,
    pub machines_total: usize,
    pub environments_active: usize,
}
