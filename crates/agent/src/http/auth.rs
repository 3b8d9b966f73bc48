// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session auth endpoints (`/auth/...`). Unauthenticated by design; the
//! challenge–response itself is the gate.

use super::AppState;
use crate::error::AgentError;
use axum::extract::{Request, State};
use axum::Json;
use cilo_wire::{ChallengeRequest, ChallengeResponse, ConnectRequest, ConnectResponse};
use std::sync::Arc;

pub async fn challenge(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChallengeRequest>,
) -> Result<Json<ChallengeResponse>, AgentError> {
    if request.public_key.is_empty() {
        return Err(AgentError::Validation("public_key is required".into()));
    }
    let (challenge, expires_at) = state.auth.challenge(&request.public_key);
    Ok(Json(ChallengeResponse { challenge, expires_at }))
}

pub async fn connect(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, AgentError> {
    let session = state.auth.connect(
        &request.public_key,
        &request.challenge,
        &request.signature,
        &request.signature_format,
    )?;
    Ok(Json(ConnectResponse { token: session.token, expires_at: session.expires_at }))
}

pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<serde_json::Value>, AgentError> {
    let token = super::bearer(&request).ok_or(AgentError::Auth)?;
    if !state.auth.disconnect(token) {
        return Err(AgentError::Auth);
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
