// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cilo machines ...` — pool management (admin).

use super::client;
use crate::exit_error::ExitError;
use cilo_wire::RegisterMachineRequest;
use clap::Subcommand;
use ipnet::Ipv4Net;

#[derive(Subcommand)]
pub enum MachinesCommand {
    /// List the pool
    List,
    /// Register an operator-managed machine (agent must be installed)
    Add {
        /// Public address
        address: String,
        /// WireGuard endpoint `host:port`
        #[arg(long)]
        endpoint: Option<String>,
        /// The machine's WireGuard public key
        #[arg(long)]
        public_key: String,
        /// Peer subnet override
        #[arg(long)]
        peer_subnet: Option<Ipv4Net>,
    },
    /// Remove an unassigned machine
    Remove { id: String },
}

pub async fn run(command: MachinesCommand) -> Result<(), ExitError> {
    let client = client()?;
    match command {
        MachinesCommand::List => {
            for machine in client.list_machines().await?.machines {
                let env = machine
                    .environment_id
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {}  {}  {}  {}",
                    machine.id, machine.provider, machine.status, machine.address, env
                );
            }
        }
        MachinesCommand::Add { address, endpoint, public_key, peer_subnet } => {
            let endpoint = endpoint.unwrap_or_else(|| format!("{address}:51820"));
            let machine = client
                .register_machine(&RegisterMachineRequest {
                    address,
                    endpoint,
                    public_key,
                    peer_subnet,
                })
                .await?;
            println!("{}  {}  {}", machine.id, machine.status, machine.address);
        }
        MachinesCommand::Remove { id } => {
            client.remove_machine(&id).await?;
            println!("{id} removed");
        }
    }
    Ok(())
}
