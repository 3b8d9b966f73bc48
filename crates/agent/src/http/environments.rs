// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment endpoints (`/environments...`).

use super::AppState;
use crate::error::AgentError;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cilo_engine::{LogOptions, Logs};
use cilo_wire::{EnvironmentList, LogsQuery, StatusResponse, UpRequest, UpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EnvironmentList>, AgentError> {
    Ok(Json(EnvironmentList { environments: state.envs.list().await? }))
}

pub async fn up(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<UpRequest>,
) -> Result<Json<UpResponse>, AgentError> {
    let services = state
        .envs
        .up(&name, request.subnet, request.build, request.recreate)
        .await?;
    Ok(Json(UpResponse { services }))
}

pub async fn down(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AgentError> {
    state.envs.down(&name).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AgentError> {
    state.envs.destroy(&name).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<StatusResponse>, AgentError> {
    Ok(Json(state.envs.status(&name).await?))
}

/// Plain-text logs; `follow=true` streams until the client hangs up, at
/// which point the child process is killed with the stream.
pub async fn logs(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Response, AgentError> {
    let opts = LogOptions { follow: query.follow, tail: query.tail };
    match state.envs.logs(&name, query.service.as_deref(), &opts).await? {
        Logs::Complete(text) => {
            Ok(([(header::CONTENT_TYPE, "text/plain")], text).into_response())
        }
        Logs::Follow(mut stream) => {
            let stdout = stream
                .take_stdout()
                .ok_or_else(|| AgentError::Runtime("log stream has no stdout".into()))?;
            let body = Body::from_stream(ReaderStream::new(stdout));
            // Reap the child once the client hangs up (EPIPE ends it)
            tokio::spawn(stream.wait());
            Ok(([(header::CONTENT_TYPE, "text/plain")], body).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    pub service: String,
    pub cmd: Vec<String>,
}

pub async fn exec(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<ExecRequest>,
) -> Result<Json<serde_json::Value>, AgentError> {
    let output = state.envs.exec(&name, &request.service, &request.cmd).await?;
    Ok(Json(serde_json::json!({ "output": output })))
}

/// Acknowledge a workspace transfer: make sure the tree exists so rsync
/// has a target, and hand back its path.
pub async fn sync(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AgentError> {
    let path = state.envs.workspaces().ensure(&name).await?;
    Ok(Json(serde_json::json!({ "ok": true, "workspace": path.display().to_string() })))
}
