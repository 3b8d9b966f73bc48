// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent HTTP API.
//!
//! Bound to the overlay address only (see [`crate::config::AgentConfig::api_bind`]);
//! an agent listening on a public interface is non-conforming. Everything
//! except `/auth/*` and `/health` requires a session bearer.

mod auth;
mod environments;
mod wireguard;

use crate::auth::AuthState;
use crate::envs::EnvManager;
use crate::error::AgentError;
use crate::peers::PeerMap;
use crate::wg::WgInterface;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use cilo_core::SystemClock;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct AppState {
    pub auth: AuthState<SystemClock>,
    pub peers: Mutex<PeerMap>,
    pub wg: WgInterface,
    pub envs: EnvManager,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/environments", get(environments::list))
        .route("/environments/:name/up", post(environments::up))
        .route("/environments/:name/down", post(environments::down))
        .route("/environments/:name", delete(environments::destroy))
        .route("/environments/:name/status", get(environments::status))
        .route("/environments/:name/logs", get(environments::logs))
        .route("/environments/:name/exec", post(environments::exec))
        .route("/environments/:name/sync", post(environments::sync))
        .route("/wireguard/exchange", post(wireguard::exchange))
        .route("/wireguard/peers/:key", delete(wireguard::remove_peer))
        .route("/wireguard/status", get(wireguard::status))
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .route("/auth/challenge", post(auth::challenge))
        .route("/auth/connect", post(auth::connect))
        .route("/auth/disconnect", delete(auth::disconnect))
        .route("/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn bearer(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn require_session(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AgentError> {
    let token = bearer(&request).ok_or(AgentError::Auth)?;
    if !state.auth.validate(token) {
        return Err(AgentError::Auth);
    }
    Ok(next.run(request).await)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}
