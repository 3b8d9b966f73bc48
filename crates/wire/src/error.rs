// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error body and kind → HTTP status mapping.

use serde::{Deserialize, Serialize};

/// Every failed request carries exactly this body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// Failure kinds the APIs distinguish, with their transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Malformed name, body, or subnet syntax
    Validation,
    /// Missing or unknown bearer
    Auth,
    /// Bearer valid but scope insufficient
    Scope,
    NotFound,
    /// Name conflict, or subnet range exhausted after retries
    Conflict,
    /// Project parse failure
    Engine,
    /// Container tool failure
    Runtime,
    /// State store unavailable; no side effects occurred
    Store,
    /// No ready machine in the pool; the caller may retry
    NoCapacity,
}

impl ApiErrorKind {
    pub fn http_status(self) -> u16 {
        match self {
            ApiErrorKind::Validation => 400,
            ApiErrorKind::Auth => 401,
            ApiErrorKind::Scope => 403,
            ApiErrorKind::NotFound => 404,
            ApiErrorKind::Conflict => 409,
            ApiErrorKind::Engine => 422,
            ApiErrorKind::Runtime | ApiErrorKind::Store => 500,
            ApiErrorKind::NoCapacity => 503,
        }
    }
}
