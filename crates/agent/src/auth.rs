// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH challenge–response session auth.
//!
//! A client proves possession of a private key whose public half is in
//! the machine's authorized-keys file: it fetches a nonce bound to its
//! public key, signs the raw nonce bytes (SSHSIG envelope, namespace
//! `cilo-agent`), and trades the signature for a 24-hour session token.
//! Nonces are single-use and expire after five minutes.

use crate::error::AgentError;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use cilo_core::{Clock, Session};
use parking_lot::Mutex;
use rand::RngCore;
use ssh_key::{PublicKey, SshSig};
use std::collections::HashMap;
use std::path::PathBuf;

/// Namespace clients sign under; must match the client driver.
pub const SSH_SIG_NAMESPACE: &str = "cilo-agent";

/// Nonce lifetime.
pub const CHALLENGE_TTL_MINUTES: i64 = 5;

struct PendingChallenge {
    public_key: String,
    expires_at: DateTime<Utc>,
}

pub struct AuthState<C: Clock> {
    authorized_keys: PathBuf,
    clock: C,
    challenges: Mutex<HashMap<String, PendingChallenge>>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl<C: Clock> AuthState<C> {
    pub fn new(authorized_keys: PathBuf, clock: C) -> Self {
        Self {
            authorized_keys,
            clock,
            challenges: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh nonce bound to the submitted public key.
    pub fn challenge(&self, public_key: &str) -> (String, DateTime<Utc>) {
        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);
        let encoded = base64::engine::general_purpose::STANDARD.encode(nonce);
        let expires_at = self.clock.now() + Duration::minutes(CHALLENGE_TTL_MINUTES);

        let mut challenges = self.challenges.lock();
        let now = self.clock.now();
        challenges.retain(|_, c| c.expires_at > now);
        challenges.insert(
            encoded.clone(),
            PendingChallenge { public_key: public_key.to_string(), expires_at },
        );
        (encoded, expires_at)
    }

    /// Verify a signed nonce and issue a session.
    pub fn connect(
        &self,
        public_key: &str,
        challenge: &str,
        signature: &str,
        signature_format: &str,
    ) -> Result<Session, AgentError> {
        if signature_format != "sshsig" {
            return Err(AgentError::Validation(format!(
                "unsupported signature format {signature_format:?}"
            )));
        }

        let now = self.clock.now();
        let pending = {
            let mut challenges = self.challenges.lock();
            // Single use: the nonce leaves the map no matter what happens next
            challenges.remove(challenge)
        };
        let pending = pending.ok_or(AgentError::Auth)?;
        if pending.expires_at <= now || pending.public_key != public_key {
            return Err(AgentError::Auth);
        }

        let key = PublicKey::from_openssh(public_key).map_err(|_| AgentError::Auth)?;
        if !self.is_authorized(&key)? {
            tracing::warn!("connect attempt with unauthorized key");
            return Err(AgentError::Auth);
        }

        let nonce = base64::engine::general_purpose::STANDARD
            .decode(challenge)
            .map_err(|_| AgentError::Auth)?;
        let sig = SshSig::from_pem(signature).map_err(|_| AgentError::Auth)?;
        key.verify(SSH_SIG_NAMESPACE, &nonce, &sig).map_err(|_| AgentError::Auth)?;

        let session = Session::issue(public_key, now);
        self.sessions.lock().insert(session.token.clone(), session.clone());
        tracing::info!(expires_at = %session.expires_at, "session issued");
        Ok(session)
    }

    /// Is this exact key in the authorized-keys file?
    fn is_authorized(&self, key: &PublicKey) -> Result<bool, AgentError> {
        let content = std::fs::read_to_string(&self.authorized_keys)?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Ok(entry) = PublicKey::from_openssh(line) {
                if entry.key_data() == key.key_data() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Bearer check for protected routes.
    pub fn validate(&self, token: &str) -> bool {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        sessions.retain(|_, s| !s.is_expired(now));
        sessions.contains_key(token)
    }

    pub fn disconnect(&self, token: &str) -> bool {
        self.sessions.lock().remove(token).is_some()
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
