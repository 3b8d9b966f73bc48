// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for a machine agent, reached over the overlay.
//!
//! Sessions come from the SSH challenge–response: the agent hands out a
//! nonce, we sign the raw bytes with the user's SSH key (SSHSIG envelope,
//! namespace `cilo-agent`), and trade the signature for a 24h token.

use crate::client::CliError;
use base64::Engine as _;
use cilo_wire::{
    ChallengeRequest, ChallengeResponse, ConnectRequest, ConnectResponse, ErrorBody, LogsQuery,
    StatusResponse, UpRequest, UpResponse,
};
use serde::de::DeserializeOwned;
use ssh_key::{HashAlg, LineEnding, PrivateKey};
use std::path::Path;
use std::time::Duration;

/// Signature namespace; must match the agent's verifier.
pub const SSH_SIG_NAMESPACE: &str = "cilo-agent";

/// Port the agent API listens on (overlay-only).
pub const AGENT_API_PORT: u16 = 8440;

pub struct AgentSession {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl AgentSession {
    /// Authenticate against the agent at `address` with the SSH key at
    /// `key_path`.
    pub async fn connect(
        address: std::net::Ipv4Addr,
        key_path: &Path,
    ) -> Result<Self, CliError> {
        let base = format!("http://{address}:{AGENT_API_PORT}");
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        let key = PrivateKey::read_openssh_file(key_path)
            .map_err(|e| CliError::Transport(format!("reading {}: {e}", key_path.display())))?;
        let public_key = key
            .public_key()
            .to_openssh()
            .map_err(|e| CliError::Transport(format!("encoding public key: {e}")))?;

        let challenge: ChallengeResponse = decode(
            http.post(format!("{base}/auth/challenge"))
                .json(&ChallengeRequest { public_key: public_key.clone() })
                .send()
                .await,
        )
        .await?;

        let nonce = base64::engine::general_purpose::STANDARD
            .decode(&challenge.challenge)
            .map_err(|e| CliError::Transport(format!("bad challenge encoding: {e}")))?;
        let signature = key
            .sign(SSH_SIG_NAMESPACE, HashAlg::Sha256, &nonce)
            .and_then(|sig| sig.to_pem(LineEnding::LF))
            .map_err(|e| CliError::Transport(format!("signing challenge: {e}")))?;

        let connect: ConnectResponse = decode(
            http.post(format!("{base}/auth/connect"))
                .json(&ConnectRequest {
                    public_key,
                    challenge: challenge.challenge,
                    signature,
                    signature_format: "sshsig".to_string(),
                })
                .send()
                .await,
        )
        .await?;

        Ok(Self { http, base, token: connect.token })
    }

    pub async fn sync_ack(&self, env: &str) -> Result<(), CliError> {
        decode::<serde_json::Value>(
            self.http
                .post(format!("{}/environments/{env}/sync", self.base))
                .bearer_auth(&self.token)
                .send()
                .await,
        )
        .await
        .map(|_| ())
    }

    pub async fn up(&self, env: &str, request: &UpRequest) -> Result<UpResponse, CliError> {
        decode(
            self.http
                .post(format!("{}/environments/{env}/up", self.base))
                .bearer_auth(&self.token)
                .json(request)
                .send()
                .await,
        )
        .await
    }

    pub async fn down(&self, env: &str) -> Result<(), CliError> {
        decode::<serde_json::Value>(
            self.http
                .post(format!("{}/environments/{env}/down", self.base))
                .bearer_auth(&self.token)
                .send()
                .await,
        )
        .await
        .map(|_| ())
    }

    pub async fn status(&self, env: &str) -> Result<StatusResponse, CliError> {
        decode(
            self.http
                .get(format!("{}/environments/{env}/status", self.base))
                .bearer_auth(&self.token)
                .send()
                .await,
        )
        .await
    }

    pub async fn logs(&self, env: &str, query: &LogsQuery) -> Result<String, CliError> {
        let mut req = self
            .http
            .get(format!("{}/environments/{env}/logs", self.base))
            .bearer_auth(&self.token)
            .query(&[("follow", "false")]);
        if let Some(service) = &query.service {
            req = req.query(&[("service", service.as_str())]);
        }
        if let Some(tail) = query.tail {
            req = req.query(&[("tail", tail.to_string())]);
        }
        let response = req.send().await.map_err(|e| CliError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(CliError::Api { status: status.as_u16(), message });
        }
        response.text().await.map_err(|e| CliError::Transport(e.to_string()))
    }

    pub async fn disconnect(self) -> Result<(), CliError> {
        decode::<serde_json::Value>(
            self.http
                .delete(format!("{}/auth/disconnect", self.base))
                .bearer_auth(&self.token)
                .send()
                .await,
        )
        .await
        .map(|_| ())
    }
}

async fn decode<T: DeserializeOwned>(
    result: Result<reqwest::Response, reqwest::Error>,
) -> Result<T, CliError> {
    let response = result.map_err(|e| CliError::Transport(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        response.json().await.map_err(|e| CliError::Transport(format!("decoding response: {e}")))
    } else {
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.error)
            .unwrap_or_else(|_| status.to_string());
        Err(CliError::Api { status: status.as_u16(), message })
    }
}
