// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client ↔ machine-agent request/response bodies.
//!
//! The agent API is reachable only over the overlay; its bearer is a
//! [`cilo_core::Session`] token issued by the SSH challenge–response flow.

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRequest {
    /// SSH public key in authorized_keys form
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// Random nonce bytes, base64; sign these exact bytes
    pub challenge: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub public_key: String,
    /// The nonce exactly as issued
    pub challenge: String,
    /// SSH signature over the raw nonce bytes, base64
    pub signature: String,
    /// Signature envelope; v1 accepts only `sshsig`
    pub signature_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpRequest {
    /// Bridge network subnet allocated by the control server
    pub subnet: Ipv4Net,
    #[serde(default)]
    pub build: bool,
    #[serde(default)]
    pub recreate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpResponse {
    /// Service name → container address on the environment network
    pub services: BTreeMap<String, Ipv4Addr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub name: String,
    /// Raw runtime status text per service
    pub services: Vec<ServiceAddress>,
    pub running: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEnvironment {
    pub name: String,
    pub workspace: String,
    pub network: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentList {
    pub environments: Vec<AgentEnvironment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default)]
    pub follow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExchangeRequest {
    /// Peer WireGuard public key (base64)
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExchangeResponse {
    /// Address assigned out of this machine's peer subnet
    pub ip: Ipv4Addr,
    /// The machine's WireGuard public key (base64)
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentWgPeer {
    pub public_key: String,
    pub allowed_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_handshake: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentWgStatus {
    pub interface: String,
    pub public_key: String,
    pub peers: Vec<AgentWgPeer>,
}
