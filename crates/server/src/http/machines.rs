// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine pool endpoints (`/v1/machines...`).

use super::{AppState, AuthContext};
use crate::error::ServerError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use cilo_core::{Machine, MachineId, MachineStatus, Provider};
use cilo_wire::{MachineList, RegisterMachineRequest};
use std::sync::Arc;

/// Register an operator-managed machine. It enters the pool `ready`;
/// the agent must already be installed and its overlay up.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<RegisterMachineRequest>,
) -> Result<Response, ServerError> {
    auth.require_admin()?;
    if request.address.is_empty() || request.public_key.is_empty() {
        return Err(ServerError::Validation("address and public_key are required".into()));
    }

    let machine = Machine {
        id: MachineId::new(),
        provider: Provider::Manual,
        address: request.address,
        endpoint: request.endpoint,
        public_key: request.public_key,
        status: MachineStatus::Ready,
        environment_id: None,
        peer_subnet: request.peer_subnet.unwrap_or(state.config.peer_subnet),
        created_at: Utc::now(),
    };
    state.store.insert_machine(&machine).await?;
    tracing::info!(machine_id = %machine.id, address = %machine.address, "machine registered");
    Ok((StatusCode::CREATED, Json(machine)).into_response())
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthContext>,
) -> Result<Json<MachineList>, ServerError> {
    Ok(Json(MachineList { machines: state.store.list_machines().await? }))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    auth.require_admin()?;
    let id = MachineId::from_string(&id);
    let machine = state
        .store
        .get_machine(&id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("machine {id}")))?;

    if machine.environment_id.is_some() {
        return Err(ServerError::Conflict("machine has an assigned environment".into()));
    }

    if machine.provider == Provider::Cloud {
        if let Some(provider) = &state.provider {
            if let Err(e) = provider.destroy(&machine).await {
                // Record removal still proceeds; the operator sees the drift
                tracing::warn!(machine_id = %id, error = %e, "cloud destroy failed");
            }
        }
    }
    state.store.delete_machine(&id).await?;
    tracing::info!(machine_id = %id, "machine removed");
    Ok(Json(serde_json::json!({ "ok": true })))
}
