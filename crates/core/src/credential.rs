// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Long-lived bearer credentials for client → server auth.
//!
//! The raw secret is shown once at creation; only its SHA-256 digest is
//! stored. The short prefix survives for display in listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a credential.
    pub struct CredentialId("key-");
}

/// Secrets look like `cilo_<40 url-safe chars>`.
const SECRET_PREFIX: &str = "cilo_";
/// Characters of the raw secret kept for display.
const DISPLAY_PREFIX_LEN: usize = 12;

/// What a credential is allowed to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Key + machine management on top of everything below
    Admin,
    /// Environment lifecycle and overlay access
    #[default]
    Developer,
    /// Automated environment lifecycle (no interactive overlay join)
    Ci,
}

impl Scope {
    pub fn can_manage_keys(self) -> bool {
        matches!(self, Scope::Admin)
    }

    pub fn can_manage_machines(self) -> bool {
        matches!(self, Scope::Admin)
    }

    pub fn can_manage_environments(self) -> bool {
        matches!(self, Scope::Admin | Scope::Developer | Scope::Ci)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Admin => write!(f, "admin"),
            Scope::Developer => write!(f, "developer"),
            Scope::Ci => write!(f, "ci"),
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Scope::Admin),
            "developer" => Ok(Scope::Developer),
            "ci" => Ok(Scope::Ci),
            other => Err(format!("unknown scope: {other:?}")),
        }
    }
}

/// Stored credential record. Never contains the raw secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub team_id: String,
    pub scope: Scope,
    /// SHA-256 of the raw secret, hex
    pub secret_hash: String,
    /// Leading characters of the raw secret, for listings
    pub prefix: String,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// Mint a credential and its raw secret. The secret is returned exactly
    /// once; callers must hand it to the user and drop it.
    pub fn generate(team_id: impl Into<String>, scope: Scope, now: DateTime<Utc>) -> (Self, String) {
        let secret = format!("{}{}", SECRET_PREFIX, nanoid::nanoid!(40));
        let credential = Self {
            id: CredentialId::new(),
            team_id: team_id.into(),
            scope,
            secret_hash: hash_secret(&secret),
            prefix: secret.chars().take(DISPLAY_PREFIX_LEN).collect(),
            created_at: now,
        };
        (credential, secret)
    }

    pub fn verify(&self, presented: &str) -> bool {
        hash_secret(presented) == self.secret_hash
    }
}

/// SHA-256 hex digest of a raw secret.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
