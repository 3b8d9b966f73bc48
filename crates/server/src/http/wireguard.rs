// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Overlay key-exchange brokering (`/v1/wireguard/...`).
//!
//! The agent owns per-peer IP allocation; the server records the mirror
//! copy and returns everything a client needs to bring its tunnel up.

use super::{AppState, AuthContext};
use crate::error::ServerError;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use cilo_core::{EnvironmentId, Peer, PeerId};
use cilo_wire::{
    ExchangeRequest, ExchangeResponse, WireguardPeerStatus, WireguardStatus,
};
use std::sync::Arc;

pub async fn exchange(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<ExchangeRequest>,
) -> Result<Json<ExchangeResponse>, ServerError> {
    if request.public_key.is_empty() {
        return Err(ServerError::Validation("public_key is required".into()));
    }

    let env_id = EnvironmentId::from_string(&request.environment_id);
    let env = state
        .store
        .get_environment(&env_id)
        .await?
        .filter(|e| e.team_id == auth.team_id)
        .ok_or_else(|| ServerError::NotFound(format!("environment {env_id}")))?;
    let machine_id = env
        .machine_id
        .ok_or_else(|| ServerError::Conflict("environment has no machine".into()))?;
    let machine = state
        .store
        .get_machine(&machine_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("machine {machine_id}")))?;

    // The agent allocates the IP and mutates the interface; adding an
    // existing key is idempotent on its side, so concurrent joins by the
    // same client converge.
    let assigned = state.agent.add_peer(&machine, &request.public_key).await?;

    let peer = Peer {
        id: PeerId::new(),
        user: auth.key_prefix.clone(),
        public_key: request.public_key.clone(),
        ip: assigned.ip,
        environment_id: env.id,
        machine_id,
        connected_at: Utc::now(),
    };
    if let Err(e) = state.store.insert_peer(&peer).await {
        if !crate::store::is_unique_violation(&e) {
            return Err(e.into());
        }
        // Re-exchange with a known key: keep the existing mirror row.
    }

    tracing::info!(
        environment_id = %env.id,
        machine_id = %machine_id,
        peer_ip = %assigned.ip,
        "peer joined"
    );

    Ok(Json(ExchangeResponse {
        assigned_ip: assigned.ip,
        machine_public_key: assigned.public_key,
        endpoint: machine.endpoint,
        allowed_ips: vec![env.subnet, machine.peer_subnet],
    }))
}

pub async fn remove_peer(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthContext>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let peer = state
        .store
        .delete_peer_by_key(&key)
        .await?
        .ok_or_else(|| ServerError::NotFound("peer".into()))?;

    if let Some(machine) = state.store.get_machine(&peer.machine_id).await? {
        // Mirror first, interface second; a dead agent only leaves a stale
        // interface entry that its own boot reconciliation clears.
        if let Err(e) = state.agent.remove_peer(&machine, &peer.public_key).await {
            tracing::warn!(machine_id = %machine.id, error = %e, "agent peer removal failed");
        }
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(env): Path<String>,
) -> Result<Json<WireguardStatus>, ServerError> {
    let env_id = EnvironmentId::from_string(&env);
    let env = state
        .store
        .get_environment(&env_id)
        .await?
        .filter(|e| e.team_id == auth.team_id)
        .ok_or_else(|| ServerError::NotFound(format!("environment {env_id}")))?;

    Ok(Json(WireguardStatus {
        environment_id: env.id.to_string(),
        peers: env
            .peers
            .into_iter()
            .map(|p| WireguardPeerStatus { public_key: p.public_key, ip: p.ip, user: p.user })
            .collect(),
    }))
}
