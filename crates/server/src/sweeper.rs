// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-destroy sweeper.
//!
//! Environments created with a TTL carry an `expires_at` deadline; this
//! background task walks them into `destroying` through the normal destroy
//! path once the deadline passes.

use crate::agent_client::AgentClient;
use crate::error::ServerError;
use crate::lifecycle::destroy_environment;
use crate::store::Store;
use cilo_core::{Clock, EnvironmentId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Sweeper<C: Clock> {
    store: Store,
    agent: Option<Arc<AgentClient>>,
    clock: C,
    interval: std::time::Duration,
}

impl<C: Clock> Sweeper<C> {
    pub fn new(
        store: Store,
        agent: Option<Arc<AgentClient>>,
        clock: C,
        interval: std::time::Duration,
    ) -> Self {
        Self { store, agent, clock, interval }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "auto-destroy sweep failed");
                    }
                }
            }
        }
    }

    /// One pass; returns the environments it destroyed.
    pub async fn sweep_once(&self) -> Result<Vec<EnvironmentId>, ServerError> {
        let expired = self.store.list_expired(self.clock.now()).await?;
        let mut destroyed = Vec::new();
        for env in expired {
            info!(environment_id = %env.id, name = %env.name, "auto-destroy timer expired");
            match destroy_environment(&self.store, self.agent.as_deref(), &env.id).await {
                Ok(()) => destroyed.push(env.id),
                Err(e) => warn!(environment_id = %env.id, error = %e, "auto-destroy failed"),
            }
        }
        Ok(destroyed)
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
