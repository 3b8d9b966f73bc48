// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command surface.

mod auth;
mod connect;
mod env;
mod install;
mod keys;
mod machines;

use crate::exit_error::ExitError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default DNS suffix environments are published under.
pub fn suffix() -> String {
    std::env::var("CILO_SUFFIX").unwrap_or_else(|_| "test".to_string())
}

#[derive(Parser)]
#[command(name = "cilo", version, about = "isolated per-environment copies of your stack")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage environments
    Env {
        #[command(subcommand)]
        command: env::EnvCommand,
    },
    /// Create (if needed) and join an environment: tunnel, DNS, workspace, up
    Connect {
        /// Environment name
        environment: String,
        /// Project directory (defaults to the current directory)
        #[arg(long)]
        path: Option<PathBuf>,
        /// SSH private key for agent auth (defaults to ~/.ssh/id_ed25519)
        #[arg(long)]
        ssh_key: Option<PathBuf>,
        /// Project tag backing the `<project>.<env>` apex
        #[arg(long)]
        project: Option<String>,
    },
    /// Leave an environment: remove this peer, tear the tunnel down
    Disconnect {
        /// Environment name
        environment: String,
    },
    /// Manage the machine pool (admin)
    Machines {
        #[command(subcommand)]
        command: machines::MachinesCommand,
    },
    /// Manage API keys (admin)
    Keys {
        #[command(subcommand)]
        command: keys::KeysCommand,
    },
    /// Log in / validate / log out
    Auth {
        #[command(subcommand)]
        command: auth::AuthCommand,
    },
    /// One-time privileged host-resolver integration
    Install {
        /// DNS suffix to delegate
        #[arg(long, default_value = "test")]
        suffix: String,
    },
}

pub async fn run(cli: Cli) -> Result<(), ExitError> {
    match cli.command {
        Command::Env { command } => env::run(command).await,
        Command::Connect { environment, path, ssh_key, project } => {
            connect::connect(&environment, path, ssh_key, project).await
        }
        Command::Disconnect { environment } => connect::disconnect(&environment).await,
        Command::Machines { command } => machines::run(command).await,
        Command::Keys { command } => keys::run(command).await,
        Command::Auth { command } => auth::run(command).await,
        Command::Install { suffix } => install::run(&suffix).await,
    }
}

/// Stored-credential client, or a helpful failure.
pub(crate) fn client() -> Result<crate::client::ServerClient, ExitError> {
    let auth = crate::auth_store::load(&crate::auth_store::cilo_home())
        .map_err(|e| ExitError::generic(e.to_string()))?;
    Ok(crate::client::ServerClient::new(auth.server, auth.api_key))
}
