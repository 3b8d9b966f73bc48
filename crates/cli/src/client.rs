// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the control server.

use cilo_core::Environment;
use cilo_wire::{
    CreateEnvironmentRequest, CreateEnvironmentResponse, CreateKeyRequest, CreateKeyResponse,
    ErrorBody, ExchangeRequest, ExchangeResponse, KeyEntry, MachineList,
    RegisterMachineRequest, ServerEnvironmentList, SyncRequest, ValidateResponse,
    WireguardStatus,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// The server answered with an error body
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("server unreachable: {0}")]
    Transport(String),
}

pub struct ServerClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl ServerClient {
    pub fn new(server: impl Into<String>, token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { http, base: server.into().trim_end_matches('/').to_string(), token: token.into() }
    }

    async fn decode<T: DeserializeOwned>(
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, CliError> {
        let response = result.map_err(|e| CliError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| CliError::Transport(format!("decoding response: {e}")))
        } else {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            Err(CliError::Api { status: status.as_u16(), message })
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CliError> {
        Self::decode(
            self.http.get(format!("{}{path}", self.base)).bearer_auth(&self.token).send().await,
        )
        .await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CliError> {
        Self::decode(
            self.http
                .post(format!("{}{path}", self.base))
                .bearer_auth(&self.token)
                .json(body)
                .send()
                .await,
        )
        .await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, CliError> {
        Self::decode(
            self.http
                .delete(format!("{}{path}", self.base))
                .bearer_auth(&self.token)
                .send()
                .await,
        )
        .await
    }

    pub async fn validate(&self) -> Result<ValidateResponse, CliError> {
        self.get("/v1/auth/validate").await
    }

    pub async fn create_environment(
        &self,
        request: &CreateEnvironmentRequest,
    ) -> Result<CreateEnvironmentResponse, CliError> {
        self.post("/v1/environments", request).await
    }

    pub async fn list_environments(&self) -> Result<Vec<Environment>, CliError> {
        let list: ServerEnvironmentList = self.get("/v1/environments").await?;
        Ok(list.environments)
    }

    pub async fn get_environment(&self, id: &str) -> Result<Environment, CliError> {
        self.get(&format!("/v1/environments/{id}")).await
    }

    /// Find an environment by its name.
    pub async fn environment_by_name(&self, name: &str) -> Result<Environment, CliError> {
        self.list_environments()
            .await?
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| CliError::Api {
                status: 404,
                message: format!("not found: environment {name}"),
            })
    }

    pub async fn destroy_environment(&self, id: &str) -> Result<(), CliError> {
        self.delete::<serde_json::Value>(&format!("/v1/environments/{id}")).await.map(|_| ())
    }

    pub async fn down_environment(&self, id: &str) -> Result<(), CliError> {
        self.post::<_, serde_json::Value>(&format!("/v1/environments/{id}/down"), &())
            .await
            .map(|_| ())
    }

    pub async fn sync_environment(
        &self,
        id: &str,
        request: &SyncRequest,
    ) -> Result<(), CliError> {
        self.post::<_, serde_json::Value>(&format!("/v1/environments/{id}/sync"), request)
            .await
            .map(|_| ())
    }

    pub async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeResponse, CliError> {
        self.post("/v1/wireguard/exchange", request).await
    }

    pub async fn remove_peer(&self, public_key: &str) -> Result<(), CliError> {
        let encoded = urlencode_key(public_key);
        self.delete::<serde_json::Value>(&format!("/v1/wireguard/peers/{encoded}"))
            .await
            .map(|_| ())
    }

    pub async fn wireguard_status(&self, env_id: &str) -> Result<WireguardStatus, CliError> {
        self.get(&format!("/v1/wireguard/status/{env_id}")).await
    }

    pub async fn list_machines(&self) -> Result<MachineList, CliError> {
        self.get("/v1/machines").await
    }

    pub async fn register_machine(
        &self,
        request: &RegisterMachineRequest,
    ) -> Result<cilo_core::Machine, CliError> {
        self.post("/v1/machines", request).await
    }

    pub async fn remove_machine(&self, id: &str) -> Result<(), CliError> {
        self.delete::<serde_json::Value>(&format!("/v1/machines/{id}")).await.map(|_| ())
    }

    pub async fn create_key(&self, request: &CreateKeyRequest) -> Result<CreateKeyResponse, CliError> {
        self.post("/v1/auth/keys", request).await
    }

    pub async fn list_keys(&self) -> Result<Vec<KeyEntry>, CliError> {
        self.get("/v1/auth/keys").await
    }

    pub async fn revoke_key(&self, id: &str) -> Result<(), CliError> {
        self.delete::<serde_json::Value>(&format!("/v1/auth/keys/{id}")).await.map(|_| ())
    }
}

/// WireGuard keys are base64 and may contain `/` and `+`.
pub fn urlencode_key(key: &str) -> String {
    key.replace('%', "%25").replace('/', "%2F").replace('+', "%2B").replace('=', "%3D")
}
