// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API (`/v1/...`).
//!
//! Every route except `/v1/health` runs behind the bearer-credential
//! middleware; handlers get the resolved [`AuthContext`] as an extension
//! and do their own scope checks. Failures render as `{"error": ...}`
//! through [`ServerError`].

mod auth;
mod environments;
mod machines;
mod wireguard;

use crate::agent_client::AgentClient;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::pool::MachineProvider;
use crate::store::Store;
use crate::subnet::SubnetAllocator;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use cilo_core::credential::hash_secret;
use cilo_core::{CredentialId, Scope};
use cilo_wire::ServerStatus;
use std::sync::Arc;

pub struct AppState {
    pub store: Store,
    pub allocator: SubnetAllocator,
    pub agent: Arc<AgentClient>,
    pub provider: Option<Arc<dyn MachineProvider>>,
    pub config: ServerConfig,
}

/// Resolved identity of the request's bearer credential.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub credential_id: CredentialId,
    pub team_id: String,
    pub team_name: String,
    pub scope: Scope,
    /// Display prefix of the credential; doubles as the peer "user" handle
    pub key_prefix: String,
}

impl AuthContext {
    pub fn require_admin(&self) -> Result<(), ServerError> {
        if self.scope.can_manage_keys() {
            Ok(())
        } else {
            Err(ServerError::Scope)
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/environments", post(environments::create).get(environments::list))
        .route(
            "/v1/environments/:id",
            get(environments::get).delete(environments::destroy),
        )
        .route("/v1/environments/:id/sync", post(environments::sync))
        .route("/v1/environments/:id/down", post(environments::down))
        .route("/v1/auth/keys", post(auth::create_key).get(auth::list_keys))
        .route("/v1/auth/keys/:id", delete(auth::revoke_key))
        .route("/v1/auth/validate", get(auth::validate))
        .route("/v1/wireguard/exchange", post(wireguard::exchange))
        .route("/v1/wireguard/peers/:key", delete(wireguard::remove_peer))
        .route("/v1/wireguard/status/:env", get(wireguard::status))
        .route("/v1/machines", post(machines::register).get(machines::list))
        .route("/v1/machines/:id", delete(machines::remove))
        .route("/v1/status", get(server_status))
        .layer(middleware::from_fn_with_state(state.clone(), require_credential))
        .route("/v1/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Bearer-credential middleware: hash the presented secret, look it up,
/// and attach the [`AuthContext`].
async fn require_credential(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let bearer = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ServerError::Auth)?;

    let credential = state
        .store
        .find_credential_by_hash(&hash_secret(bearer))
        .await?
        .ok_or(ServerError::Auth)?;

    request.extensions_mut().insert(AuthContext {
        credential_id: credential.id,
        team_id: credential.team_id,
        team_name: state.config.team_name.clone(),
        scope: credential.scope,
        key_prefix: credential.prefix,
    });
    Ok(next.run(request).await)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

async fn server_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ServerStatus>, ServerError> {
    let machines = state.store.list_machines().await?;
    Ok(Json(ServerStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        machines_ready: machines.iter().filter(|m| m.is_assignable()).count(),
        machines_total: machines.len(),
        environments_active: state.store.count_active_environments().await?,
    }))
}

/// 202 wrapper used by create-environment.
pub(crate) fn accepted<T: serde::Serialize>(body: T) -> Response {
    (StatusCode::ACCEPTED, Json(body)).into_response()
}
