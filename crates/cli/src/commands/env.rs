// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cilo env ...` — environment lifecycle against the control server.

use super::client;
use crate::exit_error::ExitError;
use cilo_core::Origin;
use cilo_wire::CreateEnvironmentRequest;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum EnvCommand {
    /// Create an environment (placement only; `connect` brings it up)
    Create {
        name: String,
        /// Project tag backing the `<project>.<env>` apex
        #[arg(long)]
        project: Option<String>,
        /// Auto-destroy after this many seconds
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// List this team's environments
    List,
    /// Show one environment
    Get { name: String },
    /// Stop an environment's containers, keeping its workspace
    Down { name: String },
    /// Destroy an environment and free its machine
    Destroy { name: String },
}

pub async fn run(command: EnvCommand) -> Result<(), ExitError> {
    let client = client()?;
    match command {
        EnvCommand::Create { name, project, ttl } => {
            let response = client
                .create_environment(&CreateEnvironmentRequest {
                    name,
                    project,
                    format: "compose".to_string(),
                    origin: Origin::Interactive,
                    ttl_seconds: ttl,
                })
                .await?;
            let env = response.environment;
            println!("{}  {}  {}  {}", env.id, env.name, env.status, env.subnet);
            println!("machine endpoint: {}", response.machine_endpoint);
        }
        EnvCommand::List => {
            for env in client.list_environments().await? {
                let machine = env
                    .machine_id
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}  {}  {}  {}  {}", env.id, env.name, env.status, env.subnet, machine);
            }
        }
        EnvCommand::Get { name } => {
            let env = client.environment_by_name(&name).await?;
            println!("{}  {}  {}  {}", env.id, env.name, env.status, env.subnet);
            for service in &env.services {
                let ip = service.ip.map(|ip| ip.to_string()).unwrap_or_else(|| "-".to_string());
                let ingress = if service.ingress { " (ingress)" } else { "" };
                println!("  {}  {}{}", service.name, ip, ingress);
            }
        }
        EnvCommand::Down { name } => {
            let env = client.environment_by_name(&name).await?;
            client.down_environment(&env.id).await?;
            println!("{} stopped", env.name);
        }
        EnvCommand::Destroy { name } => {
            let env = client.environment_by_name(&name).await?;
            client.destroy_environment(&env.id).await?;
            super::connect::refresh_resolver(&client).await?;
            println!("{} destroyed", env.name);
        }
    }
    Ok(())
}
