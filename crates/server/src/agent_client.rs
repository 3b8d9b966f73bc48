// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for machine agents.
//!
//! The agent API listens only on the machine's overlay address (the `.1`
//! of its peer subnet), so the server reaches it through its own standing
//! overlay peering, set up once at agent install. Authentication is the
//! same SSH challenge–response every client uses; the server signs with
//! its configured operator key and caches the resulting session per
//! machine.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cilo_core::subnet::nth_host;
use cilo_core::Machine;
use cilo_wire::{
    AgentExchangeRequest, AgentExchangeResponse, AgentWgStatus, ChallengeRequest,
    ChallengeResponse, ConnectRequest, ConnectResponse, ErrorBody, UpRequest, UpResponse,
};
use parking_lot::Mutex;
use ssh_key::{HashAlg, LineEnding, PrivateKey};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ServerError;

/// Port the agent API listens on (overlay-only).
pub const AGENT_API_PORT: u16 = 8440;

/// Namespace for SSH signatures in the auth flow.
pub const SSH_SIG_NAMESPACE: &str = "cilo-agent";

/// Base URL for a machine's agent API.
pub fn agent_base(machine: &Machine) -> Result<String, ServerError> {
    let addr = nth_host(machine.peer_subnet, 1)
        .ok_or_else(|| ServerError::Agent(format!("peer subnet {} too small", machine.peer_subnet)))?;
    Ok(format!("http://{addr}:{AGENT_API_PORT}"))
}

pub struct AgentClient {
    http: reqwest::Client,
    up_http: reqwest::Client,
    ssh_key: Option<PathBuf>,
    sessions: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl AgentClient {
    pub fn new(ssh_key: Option<PathBuf>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        // Bring-up pulls images; give it the full 60s budget
        let up_http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self { http, up_http, ssh_key, sessions: Mutex::new(HashMap::new()) }
    }

    fn cached_session(&self, base: &str) -> Option<String> {
        let sessions = self.sessions.lock();
        sessions.get(base).and_then(|(token, expires)| {
            // A minute of slack so a token never dies mid-request
            (Utc::now() + ChronoDuration::minutes(1) < *expires).then(|| token.clone())
        })
    }

    /// Acquire (or reuse) a session for the agent at `base`.
    async fn session(&self, base: &str) -> Result<String, ServerError> {
        if let Some(token) = self.cached_session(base) {
            return Ok(token);
        }

        let key_path = self
            .ssh_key
            .as_ref()
            .ok_or_else(|| ServerError::Agent("no ssh_key configured for agent auth".into()))?;
        let key = PrivateKey::read_openssh_file(key_path)
            .map_err(|e| ServerError::Agent(format!("reading {}: {e}", key_path.display())))?;
        let public_key = key
            .public_key()
            .to_openssh()
            .map_err(|e| ServerError::Agent(format!("encoding public key: {e}")))?;

        let challenge: ChallengeResponse = self
            .post_json(base, "/auth/challenge", None, &ChallengeRequest {
                public_key: public_key.clone(),
            })
            .await?;

        use base64::Engine as _;
        let nonce = base64::engine::general_purpose::STANDARD
            .decode(&challenge.challenge)
            .map_err(|e| ServerError::Agent(format!("bad challenge encoding: {e}")))?;
        let sig = key
            .sign(SSH_SIG_NAMESPACE, HashAlg::Sha256, &nonce)
            .map_err(|e| ServerError::Agent(format!("signing challenge: {e}")))?;
        let signature = sig
            .to_pem(LineEnding::LF)
            .map_err(|e| ServerError::Agent(format!("encoding signature: {e}")))?;

        let connect: ConnectResponse = self
            .post_json(base, "/auth/connect", None, &ConnectRequest {
                public_key,
                challenge: challenge.challenge,
                signature,
                signature_format: "sshsig".to_string(),
            })
            .await?;

        self.sessions
            .lock()
            .insert(base.to_string(), (connect.token.clone(), connect.expires_at));
        Ok(connect.token)
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        base: &str,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ServerError> {
        let mut req = self.http.post(format!("{base}{path}")).json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        decode_response(req.send().await).await
    }

    pub async fn up(
        &self,
        machine: &Machine,
        env_name: &str,
        request: &UpRequest,
    ) -> Result<UpResponse, ServerError> {
        let base = agent_base(machine)?;
        let token = self.session(&base).await?;
        let req = self
            .up_http
            .post(format!("{base}/environments/{env_name}/up"))
            .bearer_auth(&token)
            .json(request);
        decode_response(req.send().await).await
    }

    pub async fn down(&self, machine: &Machine, env_name: &str) -> Result<(), ServerError> {
        let base = agent_base(machine)?;
        let token = self.session(&base).await?;
        let req =
            self.http.post(format!("{base}/environments/{env_name}/down")).bearer_auth(&token);
        decode_response::<serde_json::Value>(req.send().await).await.map(|_| ())
    }

    pub async fn destroy(&self, machine: &Machine, env_name: &str) -> Result<(), ServerError> {
        let base = agent_base(machine)?;
        let token = self.session(&base).await?;
        let req = self.http.delete(format!("{base}/environments/{env_name}")).bearer_auth(&token);
        decode_response::<serde_json::Value>(req.send().await).await.map(|_| ())
    }

    /// Ask the agent to authorize a peer key; the agent assigns the IP.
    pub async fn add_peer(
        &self,
        machine: &Machine,
        public_key: &str,
    ) -> Result<AgentExchangeResponse, ServerError> {
        let base = agent_base(machine)?;
        let token = self.session(&base).await?;
        let req = self
            .http
            .post(format!("{base}/wireguard/exchange"))
            .bearer_auth(&token)
            .json(&AgentExchangeRequest { public_key: public_key.to_string() });
        decode_response(req.send().await).await
    }

    pub async fn remove_peer(
        &self,
        machine: &Machine,
        public_key: &str,
    ) -> Result<(), ServerError> {
        let base = agent_base(machine)?;
        let token = self.session(&base).await?;
        let encoded = urlencode_key(public_key);
        let req = self
            .http
            .delete(format!("{base}/wireguard/peers/{encoded}"))
            .bearer_auth(&token);
        decode_response::<serde_json::Value>(req.send().await).await.map(|_| ())
    }

    pub async fn wireguard_status(&self, machine: &Machine) -> Result<AgentWgStatus, ServerError> {
        let base = agent_base(machine)?;
        let token = self.session(&base).await?;
        let req = self.http.get(format!("{base}/wireguard/status")).bearer_auth(&token);
        decode_response(req.send().await).await
    }

    pub async fn health(&self, machine: &Machine) -> Result<(), ServerError> {
        let base = agent_base(machine)?;
        let req = self.http.get(format!("{base}/health"));
        decode_response::<serde_json::Value>(req.send().await).await.map(|_| ())
    }
}

/// WireGuard keys are base64 and may contain `/` and `+`.
pub fn urlencode_key(key: &str) -> String {
    key.replace('%', "%25").replace('/', "%2F").replace('+', "%2B").replace('=', "%3D")
}

async fn decode_response<T: serde::de::DeserializeOwned>(
    result: Result<reqwest::Response, reqwest::Error>,
) -> Result<T, ServerError> {
    let response = result.map_err(|e| ServerError::Agent(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        response.json().await.map_err(|e| ServerError::Agent(format!("decoding body: {e}")))
    } else {
        let error = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.error)
            .unwrap_or_else(|_| status.to_string());
        Err(ServerError::Agent(error))
    }
}

#[cfg(test)]
#[path = "agent_client_tests.rs"]
mod tests;
