// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API types shared by the client, control server, and machine agent.
//!
//! Both API surfaces speak JSON with `Authorization: Bearer <token>` and
//! report failures as `{"error": "..."}` with a status from [`ApiErrorKind`].

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod agent;
mod error;
mod server;

pub use agent::{
    AgentEnvironment, AgentExchangeRequest, AgentExchangeResponse, AgentWgPeer, AgentWgStatus,
    ChallengeRequest, ChallengeResponse, ConnectRequest, ConnectResponse, EnvironmentList,
    LogsQuery, ServiceAddress, StatusResponse, UpRequest, UpResponse,
};
pub use error::{ApiErrorKind, ErrorBody};
pub use server::{
    CreateEnvironmentRequest, CreateEnvironmentResponse, CreateKeyRequest, CreateKeyResponse,
    EnvironmentList as ServerEnvironmentList, ExchangeRequest, ExchangeResponse, KeyEntry,
    MachineList, RegisterMachineRequest, ServerStatus, SyncRequest, ValidateResponse,
    WireguardPeerStatus, WireguardStatus,
};

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
