// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peer: one authorized overlay connection from a user to a machine.
//!
//! The canonical peer list lives on the agent (it owns the interface);
//! the server keeps a mirror so it can broker multi-peer joins.

use crate::environment::EnvironmentId;
use crate::machine::MachineId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

crate::define_id! {
    /// Unique identifier for a peer record.
    pub struct PeerId("per-");
}

/// One authorized overlay endpoint (user + key) attached to a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    /// User the credential authenticated as
    pub user: String,
    /// Client WireGuard public key (base64)
    pub public_key: String,
    /// Address assigned out of the machine's peer subnet; unique per machine
    pub ip: Ipv4Addr,
    pub environment_id: EnvironmentId,
    pub machine_id: MachineId,
    pub connected_at: DateTime<Utc>,
}
