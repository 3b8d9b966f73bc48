// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine pool providers.
//!
//! One interface, two implementations: manual machines are registered by
//! an operator and never created or destroyed by cilo; cloud machines are
//! provisioned and destroyed through an external REST API. The
//! [`reconciler`] keeps the pool inside its configured band.

pub mod cloud;
pub mod manual;
pub mod reconciler;

use async_trait::async_trait;
use cilo_core::Machine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {0} cannot provision machines")]
    Unsupported(&'static str),
    #[error("cloud api error: {0}")]
    Api(String),
    #[error("agent install failed: {0}")]
    Install(String),
    #[error("provisioning timed out: {0}")]
    Timeout(String),
}

/// Details of a machine a provider brought up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedMachine {
    /// Provider-side instance handle, kept for destroy
    pub instance_id: String,
    /// Public address
    pub address: String,
    /// Overlay endpoint `host:port`
    pub endpoint: String,
    /// Machine WireGuard public key, read back after agent install
    pub public_key: String,
}

/// Machine lifecycle operations a provider implements.
#[async_trait]
pub trait MachineProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create a machine and install the agent on it.
    async fn provision(&self) -> Result<ProvisionedMachine, ProviderError>;

    /// Destroy the backing instance.
    async fn destroy(&self, machine: &Machine) -> Result<(), ProviderError>;

    /// Provider-side instance handles, for drift checks.
    async fn list(&self) -> Result<Vec<String>, ProviderError>;

    /// Is the provider itself reachable?
    async fn health(&self) -> Result<(), ProviderError>;
}
