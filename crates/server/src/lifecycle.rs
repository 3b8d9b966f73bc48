// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment lifecycle orchestration.
//!
//! The handlers, the sweeper, and the pool all drive environments through
//! these functions so that placement, release, and teardown follow one
//! code path. Placement keeps the pool invariants: the machine is assigned
//! in the same transaction that writes the environment row, and a lost
//! race simply moves on to the next candidate.

use crate::agent_client::AgentClient;
use crate::error::ServerError;
use crate::store::{is_unique_violation, Store};
use crate::subnet::{host_routes, SubnetAllocator};
use chrono::{DateTime, Duration, Utc};
use cilo_core::{validate_name, Environment, EnvironmentId, EnvironmentStatus, Machine, Service};
use cilo_wire::CreateEnvironmentRequest;
use tracing::{info, warn};

/// Place a new environment: allocate a subnet, pick a ready machine, and
/// write both in one transaction.
pub async fn create_environment(
    store: &Store,
    allocator: &SubnetAllocator,
    team_id: &str,
    request: &CreateEnvironmentRequest,
    now: DateTime<Utc>,
) -> Result<(Environment, Machine), ServerError> {
    validate_name(&request.name)?;

    // Fast-path check; the partial unique index is the real guard.
    if store.get_environment_by_name(team_id, &request.name).await?.is_some() {
        return Err(ServerError::NameConflict);
    }

    let active = store.list_active_subnets().await?;
    let foreign = host_routes().await;
    let subnet = allocator.allocate(&active, &foreign)?;

    let candidates = store.list_assignable_machines().await?;
    if candidates.is_empty() {
        return Err(ServerError::NoCapacity);
    }

    let expires_at = request
        .ttl_seconds
        .map(|secs| now + Duration::seconds(secs.min(i64::MAX as u64) as i64));

    for machine in candidates {
        let env = Environment {
            id: EnvironmentId::new(),
            name: request.name.clone(),
            team_id: team_id.to_string(),
            project: request.project.clone(),
            format: request.format.clone(),
            machine_id: Some(machine.id),
            status: EnvironmentStatus::Provisioning,
            subnet,
            services: Vec::new(),
            peers: Vec::new(),
            origin: request.origin,
            created_at: now,
            expires_at,
        };

        match store.insert_environment_assigning(&env, &machine.id).await {
            Ok(true) => {
                info!(
                    environment_id = %env.id,
                    name = %env.name,
                    machine_id = %machine.id,
                    subnet = %subnet,
                    "environment placed"
                );
                return Ok((env, machine));
            }
            // Lost the machine to a concurrent placement; try the next one
            Ok(false) => continue,
            Err(e) if is_unique_violation(&e) => return Err(ServerError::NameConflict),
            Err(e) => return Err(e.into()),
        }
    }

    Err(ServerError::NoCapacity)
}

/// Tear an environment down. Idempotent: repeat calls observe
/// `destroying`/`destroyed` and succeed without side effects.
pub async fn destroy_environment(
    store: &Store,
    agent: Option<&AgentClient>,
    id: &EnvironmentId,
) -> Result<(), ServerError> {
    let env = store
        .get_environment(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("environment {id}")))?;

    match env.status {
        EnvironmentStatus::Destroyed | EnvironmentStatus::Destroying => return Ok(()),
        status => {
            if !store.transition_environment(id, status, EnvironmentStatus::Destroying).await? {
                // Raced with another destroyer; their transition stands.
                return Ok(());
            }
        }
    }

    let machine = match &env.machine_id {
        Some(machine_id) => store.get_machine(machine_id).await?,
        None => None,
    };

    if let (Some(agent), Some(machine)) = (agent, machine.as_ref()) {
        // Best effort: a dead machine must not wedge the teardown.
        if let Err(e) = agent.destroy(machine, &env.name).await {
            warn!(environment_id = %id, error = %e, "agent teardown failed; continuing");
        }
        for peer in &env.peers {
            if let Err(e) = agent.remove_peer(machine, &peer.public_key).await {
                warn!(environment_id = %id, error = %e, "agent peer removal failed");
            }
        }
    }

    store.delete_peers_for_environment(id).await?;

    if let Some(machine_id) = env.machine_id.as_ref() {
        store.release_machine(machine_id, id).await?;
    }
    store.clear_environment_machine(id).await?;

    store
        .transition_environment(id, EnvironmentStatus::Destroying, EnvironmentStatus::Destroyed)
        .await?;
    info!(environment_id = %id, name = %env.name, "environment destroyed");
    Ok(())
}

/// Client signals the workspace transfer started.
pub async fn sync_environment(store: &Store, id: &EnvironmentId) -> Result<(), ServerError> {
    let env = store
        .get_environment(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("environment {id}")))?;
    match env.status {
        EnvironmentStatus::Syncing => Ok(()),
        EnvironmentStatus::Provisioning => {
            store
                .transition_environment(id, EnvironmentStatus::Provisioning, EnvironmentStatus::Syncing)
                .await?;
            Ok(())
        }
        status => Err(ServerError::Conflict(format!("cannot sync environment in {status}"))),
    }
}

/// Record the service→IP map observed after bring-up and mark the
/// environment running.
pub async fn report_services(
    store: &Store,
    id: &EnvironmentId,
    services: &[Service],
) -> Result<(), ServerError> {
    let env = store
        .get_environment(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("environment {id}")))?;

    match env.status {
        EnvironmentStatus::Provisioning => {
            store
                .transition_environment(id, EnvironmentStatus::Provisioning, EnvironmentStatus::Syncing)
                .await?;
            store
                .transition_environment(id, EnvironmentStatus::Syncing, EnvironmentStatus::Running)
                .await?;
        }
        EnvironmentStatus::Syncing => {
            store
                .transition_environment(id, EnvironmentStatus::Syncing, EnvironmentStatus::Running)
                .await?;
        }
        EnvironmentStatus::Stopped => {
            store
                .transition_environment(id, EnvironmentStatus::Stopped, EnvironmentStatus::Running)
                .await?;
        }
        EnvironmentStatus::Running => {}
        status => {
            return Err(ServerError::Conflict(format!(
                "cannot report services for environment in {status}"
            )))
        }
    }
    store.set_environment_services(id, services).await?;
    Ok(())
}

/// Stop a running environment's containers, keeping the workspace.
pub async fn down_environment(
    store: &Store,
    agent: Option<&AgentClient>,
    id: &EnvironmentId,
) -> Result<(), ServerError> {
    let env = store
        .get_environment(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("environment {id}")))?;

    if env.status == EnvironmentStatus::Stopped {
        return Ok(());
    }
    if env.status != EnvironmentStatus::Running {
        return Err(ServerError::Conflict(format!("cannot stop environment in {}", env.status)));
    }

    if let (Some(agent), Some(machine_id)) = (agent, env.machine_id.as_ref()) {
        if let Some(machine) = store.get_machine(machine_id).await? {
            agent.down(&machine, &env.name).await?;
        }
    }

    store.transition_environment(id, EnvironmentStatus::Running, EnvironmentStatus::Stopped).await?;
    Ok(())
}

/// Mark an environment failed after an agent error and free its machine.
pub async fn fail_environment(store: &Store, id: &EnvironmentId) -> Result<(), ServerError> {
    let env = store
        .get_environment(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("environment {id}")))?;
    store.set_environment_error(id).await?;
    if let Some(machine_id) = env.machine_id.as_ref() {
        store.release_machine(machine_id, id).await?;
    }
    warn!(environment_id = %id, "environment marked error; machine released");
    Ok(())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
