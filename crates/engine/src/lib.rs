// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cilo-engine: project parsing and container-runtime driving.
//!
//! The engine turns a project directory into a format-neutral
//! [`EnvironmentDescription`] (via an ordered [`parser::ParserRegistry`])
//! and realizes that description on a container runtime behind the
//! [`runtime::Runtime`] interface. Both the client (local environments)
//! and the machine agent embed it.

pub mod description;
pub mod parser;
pub mod runtime;
pub mod subprocess;

pub use description::{
    BuildSpec, CommandSpec, EnvironmentDescription, HealthCheck, NetworkSpec, PortMapping,
    ServiceSpec, VolumeMount, VolumeSpec,
};
pub use parser::{compose::ComposeParser, EngineError, Parser, ParserRegistry};
pub use runtime::{
    compose_cli::ComposeCli, LogOptions, LogStream, Logs, Runtime, RuntimeError,
    ServiceRuntimeInfo, ServiceState, UpOptions,
};

/// Container networks owned by cilo are named `cilo-<env>` and labeled so
/// that agent boot reconciliation can tell them apart from user networks.
pub const NETWORK_PREFIX: &str = "cilo-";
pub const OWNED_LABEL: &str = "cilo.owned=true";

/// Bridge-network name for an environment.
pub fn network_name(env: &str) -> String {
    format!("{NETWORK_PREFIX}{env}")
}

/// Compose project name for an environment (also the container-name prefix).
pub fn project_name(env: &str) -> String {
    format!("cilo-{env}")
}
