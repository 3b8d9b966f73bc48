// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool reconciliation.
//!
//! A single serial worker per provider keeps
//! `min_ready ≤ count(ready ∧ unassigned)` and the total under
//! `max_total`. Provisioning failures back off exponentially; after the
//! configured ceiling the reconciler stops trying until the operator
//! intervenes (failed machine rows stay visible in listings).

use super::{MachineProvider, ProviderError};
use crate::config::PoolConfig;
use crate::error::ServerError;
use crate::store::Store;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cilo_core::{Clock, Machine, MachineId, MachineStatus, Provider};
use ipnet::Ipv4Net;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// First retry delay; doubles per consecutive failure, capped at 15 min.
const BACKOFF_BASE_SECS: i64 = 30;
const BACKOFF_CAP_SECS: i64 = 900;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub provisioned: usize,
    pub destroyed: usize,
    pub skipped_backoff: bool,
}

pub struct Reconciler<C: Clock> {
    store: Store,
    provider: Arc<dyn MachineProvider>,
    pool: PoolConfig,
    peer_subnet: Ipv4Net,
    clock: C,
    consecutive_failures: u32,
    retry_after: Option<DateTime<Utc>>,
}

impl<C: Clock> Reconciler<C> {
    pub fn new(
        store: Store,
        provider: Arc<dyn MachineProvider>,
        pool: PoolConfig,
        peer_subnet: Ipv4Net,
        clock: C,
    ) -> Self {
        Self {
            store,
            provider,
            pool,
            peer_subnet,
            clock,
            consecutive_failures: 0,
            retry_after: None,
        }
    }

    /// Serial reconcile loop; one tick at a time, no overlap.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(self.pool.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.reconcile_once().await {
                        warn!(error = %e, "pool reconcile tick failed");
                    }
                }
            }
        }
    }

    pub async fn reconcile_once(&mut self) -> Result<ReconcileOutcome, ServerError> {
        let mut outcome = ReconcileOutcome::default();
        let machines = self.store.list_machines().await?;

        let ready_unassigned =
            machines.iter().filter(|m| m.is_assignable()).count();
        let assigned =
            machines.iter().filter(|m| m.status == MachineStatus::Assigned).count();
        let live = machines
            .iter()
            .filter(|m| !matches!(m.status, MachineStatus::Destroyed | MachineStatus::Failed))
            .count();

        // Grow toward min_ready, within the total ceiling.
        let deficit = self
            .pool
            .min_ready
            .saturating_sub(ready_unassigned)
            .min(self.pool.max_total.saturating_sub(live));

        if deficit > 0 {
            if self.consecutive_failures >= self.pool.failure_ceiling {
                outcome.skipped_backoff = true;
            } else if let Some(after) = self.retry_after {
                if self.clock.now() < after {
                    outcome.skipped_backoff = true;
                }
            }

            if !outcome.skipped_backoff {
                for _ in 0..deficit {
                    match self.provision_one().await {
                        Ok(()) => {
                            self.consecutive_failures = 0;
                            self.retry_after = None;
                            outcome.provisioned += 1;
                        }
                        Err(e) => {
                            self.consecutive_failures += 1;
                            let delay = (BACKOFF_BASE_SECS
                                << self.consecutive_failures.min(16).saturating_sub(1))
                            .min(BACKOFF_CAP_SECS);
                            self.retry_after =
                                Some(self.clock.now() + ChronoDuration::seconds(delay));
                            warn!(
                                error = %e,
                                failures = self.consecutive_failures,
                                retry_in_secs = delay,
                                "machine provisioning failed"
                            );
                            break;
                        }
                    }
                }
            }
        }

        // Shrink: surplus ready machines beyond the band, cloud only.
        // The band is min_ready ≤ ready∧unassigned ≤ max_total - assigned,
        // with min_ready as the floor when the two conflict.
        let allowed_ready =
            self.pool.min_ready.max(self.pool.max_total.saturating_sub(assigned));
        let surplus = ready_unassigned.saturating_sub(allowed_ready);
        if surplus > 0 {
            let victims: Vec<Machine> = machines
                .into_iter()
                .filter(|m| m.is_assignable() && m.provider == Provider::Cloud)
                .take(surplus)
                .collect();
            for machine in victims {
                if let Err(e) = self.destroy_one(&machine).await {
                    warn!(machine_id = %machine.id, error = %e, "machine destroy failed");
                } else {
                    outcome.destroyed += 1;
                }
            }
        }

        Ok(outcome)
    }

    async fn provision_one(&self) -> Result<(), ProviderError> {
        let id = MachineId::new();
        let record = Machine {
            id,
            provider: Provider::Cloud,
            address: String::new(),
            endpoint: String::new(),
            public_key: String::new(),
            status: MachineStatus::Provisioning,
            environment_id: None,
            peer_subnet: self.peer_subnet,
            created_at: self.clock.now(),
        };
        self.store
            .insert_machine(&record)
            .await
            .map_err(|e| ProviderError::Api(format!("store: {e}")))?;

        match self.provider.provision().await {
            Ok(provisioned) => {
                self.store
                    .update_machine_details(
                        &id,
                        &provisioned.address,
                        &provisioned.endpoint,
                        &provisioned.public_key,
                    )
                    .await
                    .map_err(|e| ProviderError::Api(format!("store: {e}")))?;
                self.store
                    .transition_machine(&id, MachineStatus::Provisioning, MachineStatus::Ready)
                    .await
                    .map_err(|e| ProviderError::Api(format!("store: {e}")))?;
                info!(machine_id = %id, address = %provisioned.address, "machine ready");
                Ok(())
            }
            Err(e) => {
                let _ = self
                    .store
                    .transition_machine(&id, MachineStatus::Provisioning, MachineStatus::Failed)
                    .await;
                Err(e)
            }
        }
    }

    async fn destroy_one(&self, machine: &Machine) -> Result<(), ProviderError> {
        let moved = self
            .store
            .transition_machine(&machine.id, MachineStatus::Ready, MachineStatus::Destroying)
            .await
            .map_err(|e| ProviderError::Api(format!("store: {e}")))?;
        if !moved {
            // Raced with a placement; the machine is busy now.
            return Ok(());
        }
        self.provider.destroy(machine).await?;
        self.store
            .transition_machine(&machine.id, MachineStatus::Destroying, MachineStatus::Destroyed)
            .await
            .map_err(|e| ProviderError::Api(format!("store: {e}")))?;
        info!(machine_id = %machine.id, "machine destroyed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
