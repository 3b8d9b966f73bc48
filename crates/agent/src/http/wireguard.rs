// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Overlay peer endpoints (`/wireguard/...`).
//!
//! The agent is the canonical owner of the peer list: the persisted map
//! assigns addresses, the interface enforces them (`allowed-ips = ip/32`).

use super::AppState;
use crate::error::AgentError;
use axum::extract::{Path, State};
use axum::Json;
use cilo_wire::{AgentExchangeRequest, AgentExchangeResponse, AgentWgStatus};
use std::sync::Arc;

/// Authorize a peer key: allocate (or re-read) its address, install it on
/// the interface, and return the machine's public key.
pub async fn exchange(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AgentExchangeRequest>,
) -> Result<Json<AgentExchangeResponse>, AgentError> {
    if request.public_key.is_empty() {
        return Err(AgentError::Validation("public_key is required".into()));
    }

    let ip = {
        let mut peers = state.peers.lock();
        peers.allocate(&request.public_key)?
    };
    // Existing keys re-install the same allowed-ips: a no-op on the
    // interface, so concurrent joiners never disturb each other.
    state.wg.add_peer(&request.public_key, ip).await?;
    let public_key = state.wg.public_key().await?;

    tracing::info!(peer_ip = %ip, "peer authorized");
    Ok(Json(AgentExchangeResponse { ip, public_key }))
}

pub async fn remove_peer(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, AgentError> {
    let removed = {
        let mut peers = state.peers.lock();
        peers.remove(&key)?
    };
    // Clear the interface entry either way; removal is idempotent.
    state.wg.remove_peer(&key).await?;
    Ok(Json(serde_json::json!({ "ok": true, "removed": removed.is_some() })))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AgentWgStatus>, AgentError> {
    Ok(Json(state.wg.status().await?))
}
