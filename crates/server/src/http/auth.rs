// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential management and validation (`/v1/auth/...`).

use super::{AppState, AuthContext};
use crate::error::ServerError;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use cilo_core::{Credential, CredentialId};
use cilo_wire::{CreateKeyRequest, CreateKeyResponse, KeyEntry, ValidateResponse};
use std::sync::Arc;

pub async fn create_key(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateKeyRequest>,
) -> Result<Json<CreateKeyResponse>, ServerError> {
    auth.require_admin()?;
    let (credential, secret) = Credential::generate(&auth.team_id, request.scope, Utc::now());
    state.store.insert_credential(&credential).await?;
    tracing::info!(credential_id = %credential.id, scope = %credential.scope, "credential created");
    // The raw secret leaves the server exactly once, here.
    Ok(Json(CreateKeyResponse {
        id: credential.id.to_string(),
        secret,
        prefix: credential.prefix,
        scope: credential.scope,
    }))
}

pub async fn list_keys(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<KeyEntry>>, ServerError> {
    auth.require_admin()?;
    let credentials = state.store.list_credentials(&auth.team_id).await?;
    Ok(Json(
        credentials
            .into_iter()
            .map(|c| KeyEntry {
                id: c.id.to_string(),
                prefix: c.prefix,
                scope: c.scope,
                created_at: c.created_at,
            })
            .collect(),
    ))
}

pub async fn revoke_key(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    auth.require_admin()?;
    let deleted = state.store.delete_credential(&CredentialId::from_string(&id)).await?;
    if !deleted {
        return Err(ServerError::NotFound(format!("credential {id}")));
    }
    tracing::info!(credential_id = %id, "credential revoked");
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn validate(
    Extension(auth): Extension<AuthContext>,
) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        team_id: auth.team_id,
        team_name: auth.team_name,
        scope: auth.scope,
    })
}
