// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cilo_engine::{EngineError, RuntimeError};
use cilo_wire::{ApiErrorKind, ErrorBody};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("authentication failed")]
    Auth,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("network collision: {0}")]
    NetworkCollision(String),
    #[error("peer subnet exhausted")]
    PeerExhausted,
    #[error("engine: {0}")]
    Engine(String),
    #[error("runtime: {0}")]
    Runtime(String),
    #[error("overlay: {0}")]
    Overlay(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            AgentError::Validation(_) => ApiErrorKind::Validation,
            AgentError::Auth => ApiErrorKind::Auth,
            AgentError::NotFound(_) => ApiErrorKind::NotFound,
            AgentError::Conflict(_)
            | AgentError::NetworkCollision(_)
            | AgentError::PeerExhausted => ApiErrorKind::Conflict,
            AgentError::Engine(_) => ApiErrorKind::Engine,
            AgentError::Runtime(_) | AgentError::Overlay(_) | AgentError::Io(_) => {
                ApiErrorKind::Runtime
            }
        }
    }
}

impl From<crate::peers::PeerMapError> for AgentError {
    fn from(e: crate::peers::PeerMapError) -> Self {
        match e {
            crate::peers::PeerMapError::Exhausted => AgentError::PeerExhausted,
            other => AgentError::Overlay(other.to_string()),
        }
    }
}

impl From<cilo_core::NameError> for AgentError {
    fn from(e: cilo_core::NameError) -> Self {
        AgentError::Validation(e.to_string())
    }
}

impl From<EngineError> for AgentError {
    fn from(e: EngineError) -> Self {
        AgentError::Engine(e.to_string())
    }
}

impl From<RuntimeError> for AgentError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::NetworkCollision { name, detail } => {
                AgentError::NetworkCollision(format!("{name}: {detail}"))
            }
            other => AgentError::Runtime(other.to_string()),
        }
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}
