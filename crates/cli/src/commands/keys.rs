// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cilo keys ...` — credential management (admin).

use super::client;
use crate::exit_error::ExitError;
use cilo_core::Scope;
use cilo_wire::CreateKeyRequest;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Mint a credential; the secret prints exactly once
    Create {
        /// admin | developer | ci
        #[arg(long, default_value = "developer")]
        scope: String,
    },
    /// List credentials (prefixes only)
    List,
    /// Revoke a credential
    Revoke { id: String },
}

pub async fn run(command: KeysCommand) -> Result<(), ExitError> {
    let client = client()?;
    match command {
        KeysCommand::Create { scope } => {
            let scope: Scope =
                scope.parse().map_err(|e: String| ExitError::new(2, e))?;
            let response = client.create_key(&CreateKeyRequest { scope }).await?;
            println!("{}  {}  {}", response.id, response.scope, response.prefix);
            println!("secret (shown once): {}", response.secret);
        }
        KeysCommand::List => {
            for key in client.list_keys().await? {
                println!("{}  {}  {}…  {}", key.id, key.scope, key.prefix, key.created_at);
            }
        }
        KeysCommand::Revoke { id } => {
            client.revoke_key(&id).await?;
            println!("{id} revoked");
        }
    }
    Ok(())
}
