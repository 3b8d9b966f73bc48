// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment lifecycle endpoints (`/v1/environments...`).

use super::{accepted, AppState, AuthContext};
use crate::error::ServerError;
use crate::lifecycle;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};
use chrono::Utc;
use cilo_core::{Environment, EnvironmentId};
use cilo_wire::{
    CreateEnvironmentRequest, CreateEnvironmentResponse, ServerEnvironmentList, SyncRequest,
};
use std::sync::Arc;

/// Look up an environment, scoped to the caller's team.
async fn team_environment(
    state: &AppState,
    auth: &AuthContext,
    id: &str,
) -> Result<Environment, ServerError> {
    let env = state
        .store
        .get_environment(&EnvironmentId::from_string(id))
        .await?
        .filter(|env| env.team_id == auth.team_id)
        .ok_or_else(|| ServerError::NotFound(format!("environment {id}")))?;
    Ok(env)
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateEnvironmentRequest>,
) -> Result<Response, ServerError> {
    if !auth.scope.can_manage_environments() {
        return Err(ServerError::Scope);
    }
    let (environment, machine) = lifecycle::create_environment(
        &state.store,
        &state.allocator,
        &auth.team_id,
        &request,
        Utc::now(),
    )
    .await?;
    // 202: placement happened, bring-up hasn't. GET observes the rest.
    Ok(accepted(CreateEnvironmentResponse { environment, machine_endpoint: machine.endpoint }))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ServerEnvironmentList>, ServerError> {
    let environments = state.store.list_environments(&auth.team_id).await?;
    Ok(Json(ServerEnvironmentList { environments }))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<Environment>, ServerError> {
    Ok(Json(team_environment(&state, &auth, &id).await?))
}

pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let env = team_environment(&state, &auth, &id).await?;
    lifecycle::destroy_environment(&state.store, Some(&state.agent), &env.id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Transfer signal and service report share this endpoint: an empty body
/// marks the workspace transfer started; a body with services records the
/// observed service→IP map and marks the environment running.
pub async fn sync(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    body: Option<Json<SyncRequest>>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let env = team_environment(&state, &auth, &id).await?;
    match body.and_then(|Json(b)| b.services) {
        Some(services) => {
            lifecycle::report_services(&state.store, &env.id, &services).await?;
        }
        None => {
            lifecycle::sync_environment(&state.store, &env.id).await?;
        }
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn down(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let env = team_environment(&state, &auth, &id).await?;
    lifecycle::down_environment(&state.store, Some(&state.agent), &env.id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
