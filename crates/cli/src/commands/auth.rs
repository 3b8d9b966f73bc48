// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cilo auth ...` — credential storage and validation.

use crate::auth_store::{self, cilo_home, CloudAuth};
use crate::client::ServerClient;
use crate::exit_error::ExitError;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Validate and store a server + API key pair
    Login {
        /// Server URL, e.g. https://cilo.example.com
        server: String,
        /// API key (from `cilo keys create` or the bootstrap output)
        api_key: String,
    },
    /// Show what the stored credential resolves to
    Validate,
    /// Forget the stored credential
    Logout,
}

pub async fn run(command: AuthCommand) -> Result<(), ExitError> {
    match command {
        AuthCommand::Login { server, api_key } => {
            // Validate before persisting anything
            let client = ServerClient::new(&server, &api_key);
            let validated = client.validate().await?;
            auth_store::save(
                &cilo_home(),
                &CloudAuth { server, api_key, team_id: Some(validated.team_id.clone()) },
            )
            .map_err(|e| ExitError::generic(e.to_string()))?;
            println!("logged in as {} ({})", validated.team_name, validated.scope);
        }
        AuthCommand::Validate => {
            let client = super::client()?;
            let validated = client.validate().await?;
            println!("{}  {}  {}", validated.team_id, validated.team_name, validated.scope);
        }
        AuthCommand::Logout => {
            auth_store::clear(&cilo_home()).map_err(|e| ExitError::generic(e.to_string()))?;
            println!("logged out");
        }
    }
    Ok(())
}
