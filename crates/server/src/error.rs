// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server error type and its HTTP mapping.
//!
//! Every handler failure flows through [`ServerError`]; the `Display`
//! string becomes the `{"error": ...}` body and the kind picks the status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cilo_wire::{ApiErrorKind, ErrorBody};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("authentication failed")]
    Auth,
    #[error("insufficient scope")]
    Scope,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("name conflict")]
    NameConflict,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("no capacity")]
    NoCapacity,
    #[error("subnet range exhausted")]
    SubnetExhausted,
    #[error("agent call failed: {0}")]
    Agent(String),
    #[error("state store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl ServerError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ServerError::Validation(_) => ApiErrorKind::Validation,
            ServerError::Auth => ApiErrorKind::Auth,
            ServerError::Scope => ApiErrorKind::Scope,
            ServerError::NotFound(_) => ApiErrorKind::NotFound,
            ServerError::NameConflict | ServerError::Conflict(_) | ServerError::SubnetExhausted => {
                ApiErrorKind::Conflict
            }
            ServerError::NoCapacity => ApiErrorKind::NoCapacity,
            ServerError::Agent(_) => ApiErrorKind::Runtime,
            ServerError::Store(_) => ApiErrorKind::Store,
        }
    }
}

impl From<cilo_core::NameError> for ServerError {
    fn from(e: cilo_core::NameError) -> Self {
        ServerError::Validation(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
