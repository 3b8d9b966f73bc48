// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container runtime interface.
//!
//! A [`Runtime`] realizes an [`EnvironmentDescription`] as running
//! containers attached to the environment's bridge network. Two
//! implementations exist, both CLI-driven: the docker-compose family and
//! the podman-compose family ([`compose_cli::ComposeCli`]). Selection is
//! by binary detection at startup with a config override.

pub mod compose_cli;

use crate::description::EnvironmentDescription;
use crate::subprocess::SubprocessError;
use async_trait::async_trait;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("container tool not found: {0}")]
    ToolMissing(String),
    #[error("network {name} collides with an existing subnet: {detail}")]
    NetworkCollision { name: String, detail: String },
    #[error("service not found: {0}")]
    UnknownService(String),
    #[error("unexpected {tool} output: {detail}")]
    Malformed { tool: String, detail: String },
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// The only failure worth one local retry: a racing network create.
    pub fn is_already_exists(&self) -> bool {
        match self {
            RuntimeError::Subprocess(SubprocessError::Failed { stderr, .. }) => {
                stderr.contains("already exists")
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpOptions {
    /// Build images before starting
    pub build: bool,
    /// Force-recreate containers even when their spec is unchanged
    pub recreate: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub follow: bool,
    pub tail: Option<u32>,
}

/// A service as observed on the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRuntimeInfo {
    pub name: String,
    /// Address on the environment-owned network
    pub ip: Option<Ipv4Addr>,
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceState {
    pub name: String,
    pub state: String,
}

/// Log output: complete capture, or a live stream for `follow`.
#[derive(Debug)]
pub enum Logs {
    Complete(String),
    /// The child is killed when the stream is dropped
    Follow(LogStream),
}

/// A `logs --follow` child whose stdout the caller pipes onward.
#[derive(Debug)]
pub struct LogStream {
    child: tokio::process::Child,
}

impl LogStream {
    pub(crate) fn new(child: tokio::process::Child) -> Self {
        Self { child }
    }

    /// Take the stdout handle; the child dies with the stream (kill-on-drop).
    pub fn take_stdout(&mut self) -> Option<tokio::process::ChildStdout> {
        self.child.stdout.take()
    }

    pub async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }

    /// Park until the child exits. With stdout handed to a response body,
    /// the child dies on EPIPE as soon as the reader goes away; waiting on
    /// it here reaps the process instead of leaking a zombie.
    pub async fn wait(mut self) {
        let _ = self.child.wait().await;
    }
}

/// Operations every container runtime implementation provides.
///
/// Contracts:
/// - `up` with `recreate = false` must not recreate containers whose
///   declared spec is unchanged.
/// - `destroy` removes containers and anonymous volumes, never volumes
///   flagged external.
/// - `services` reports addresses on the environment-owned network; when a
///   container joins several networks, the environment network wins.
/// - `create_network` is idempotent for an identical subnet and reports a
///   collision otherwise.
#[async_trait]
pub trait Runtime: Send + Sync {
    fn name(&self) -> &'static str;

    async fn up(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
        opts: &UpOptions,
    ) -> Result<(), RuntimeError>;

    async fn down(&self, desc: &EnvironmentDescription, env: &str) -> Result<(), RuntimeError>;

    async fn destroy(&self, desc: &EnvironmentDescription, env: &str) -> Result<(), RuntimeError>;

    async fn status(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
    ) -> Result<Vec<ServiceState>, RuntimeError>;

    async fn services(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
    ) -> Result<Vec<ServiceRuntimeInfo>, RuntimeError>;

    async fn logs(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
        service: Option<&str>,
        opts: &LogOptions,
    ) -> Result<Logs, RuntimeError>;

    async fn exec(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
        service: &str,
        cmd: &[String],
    ) -> Result<String, RuntimeError>;

    async fn create_network(&self, env: &str, subnet: Ipv4Net) -> Result<(), RuntimeError>;

    async fn remove_network(&self, env: &str) -> Result<(), RuntimeError>;

    /// Networks labeled as cilo-owned, for boot reconciliation.
    async fn list_owned_networks(&self) -> Result<Vec<String>, RuntimeError>;
}
