// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cilo_core::FakeClock;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Provider with a programmable outcome queue.
struct FakeProvider {
    outcomes: Mutex<VecDeque<Result<super::super::ProvisionedMachine, ProviderError>>>,
    destroyed: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self { outcomes: Mutex::new(VecDeque::new()), destroyed: Mutex::new(Vec::new()) })
    }

    fn push_ok(&self, n: usize) {
        let mut outcomes = self.outcomes.lock();
        for i in 0..n {
            outcomes.push_back(Ok(super::super::ProvisionedMachine {
                instance_id: format!("i-{i}"),
                address: format!("203.0.113.{}", 10 + i),
                endpoint: format!("203.0.113.{}:51820", 10 + i),
                public_key: format!("pk-{i}"),
            }));
        }
    }

    fn push_err(&self, n: usize) {
        let mut outcomes = self.outcomes.lock();
        for _ in 0..n {
            outcomes.push_back(Err(ProviderError::Api("boom".to_string())));
        }
    }
}

#[async_trait::async_trait]
impl MachineProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn provision(&self) -> Result<super::super::ProvisionedMachine, ProviderError> {
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Api("exhausted".to_string())))
    }

    async fn destroy(&self, machine: &Machine) -> Result<(), ProviderError> {
        self.destroyed.lock().push(machine.id.to_string());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    async fn health(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

fn pool(min_ready: usize, max_total: usize) -> PoolConfig {
    PoolConfig { min_ready, max_total, interval_secs: 1, failure_ceiling: 3 }
}

async fn reconciler(
    min_ready: usize,
    max_total: usize,
    provider: Arc<FakeProvider>,
) -> (Reconciler<FakeClock>, Store, FakeClock) {
    let store = Store::open(":memory:").await.unwrap();
    let clock = FakeClock::new();
    let r = Reconciler::new(
        store.clone(),
        provider,
        pool(min_ready, max_total),
        "10.100.0.0/24".parse().unwrap(),
        clock.clone(),
    );
    (r, store, clock)
}

async fn count_ready(store: &Store) -> usize {
    store.list_assignable_machines().await.unwrap().len()
}

#[tokio::test]
async fn pool_reaches_min_ready_in_one_tick() {
    let provider = FakeProvider::new();
    provider.push_ok(2);
    let (mut reconciler, store, _) = reconciler(2, 5, provider).await;

    let outcome = reconciler.reconcile_once().await.unwrap();
    assert_eq!(outcome.provisioned, 2);
    assert_eq!(count_ready(&store).await, 2);

    // Band satisfied: next tick is a no-op
    let outcome = reconciler.reconcile_once().await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::default());
}

#[tokio::test]
async fn provisioning_respects_max_total() {
    let provider = FakeProvider::new();
    provider.push_ok(10);
    let (mut reconciler, store, _) = reconciler(5, 3, provider).await;

    reconciler.reconcile_once().await.unwrap();
    assert_eq!(count_ready(&store).await, 3);
}

#[tokio::test]
async fn failure_marks_machine_failed_and_backs_off() {
    let provider = FakeProvider::new();
    provider.push_err(1);
    provider.push_ok(1);
    let (mut reconciler, store, clock) = reconciler(1, 5, provider).await;

    let outcome = reconciler.reconcile_once().await.unwrap();
    assert_eq!(outcome.provisioned, 0);
    let failed = store
        .list_machines()
        .await
        .unwrap()
        .iter()
        .filter(|m| m.status == MachineStatus::Failed)
        .count();
    assert_eq!(failed, 1);

    // Within the backoff window nothing happens
    let outcome = reconciler.reconcile_once().await.unwrap();
    assert!(outcome.skipped_backoff);
    assert_eq!(count_ready(&store).await, 0);

    // After the window the retry succeeds
    clock.advance(std::time::Duration::from_secs(31));
    let outcome = reconciler.reconcile_once().await.unwrap();
    assert_eq!(outcome.provisioned, 1);
    assert_eq!(count_ready(&store).await, 1);
}

#[tokio::test]
async fn ceiling_stops_retries_for_good() {
    let provider = FakeProvider::new();
    provider.push_err(10);
    let (mut reconciler, store, clock) = reconciler(1, 10, provider.clone()).await;

    for _ in 0..3 {
        reconciler.reconcile_once().await.unwrap();
        clock.advance(std::time::Duration::from_secs(3600));
    }
    // Ceiling reached: further ticks skip provisioning entirely
    let outcome = reconciler.reconcile_once().await.unwrap();
    assert!(outcome.skipped_backoff);
    assert_eq!(outcome.provisioned, 0);

    let failed = store
        .list_machines()
        .await
        .unwrap()
        .iter()
        .filter(|m| m.status == MachineStatus::Failed)
        .count();
    assert_eq!(failed, 3);
}

#[tokio::test]
async fn surplus_cloud_machines_are_destroyed() {
    let provider = FakeProvider::new();
    provider.push_ok(3);
    let (mut reconciler, store, _) = reconciler(3, 5, provider.clone()).await;
    reconciler.reconcile_once().await.unwrap();
    assert_eq!(count_ready(&store).await, 3);

    // Operator lowers the band
    reconciler.pool.min_ready = 1;
    reconciler.pool.max_total = 1;
    let outcome = reconciler.reconcile_once().await.unwrap();
    assert_eq!(outcome.destroyed, 2);
    assert_eq!(count_ready(&store).await, 1);
    assert_eq!(provider.destroyed.lock().len(), 2);
}

#[tokio::test]
async fn manual_machines_are_never_destroyed() {
    let provider = FakeProvider::new();
    let (mut reconciler, store, _) = reconciler(0, 0, provider.clone()).await;
    let manual = Machine {
        id: cilo_core::MachineId::from_string("mch-manual"),
        provider: Provider::Manual,
        address: "203.0.113.1".to_string(),
        endpoint: "203.0.113.1:51820".to_string(),
        public_key: "pk".to_string(),
        status: MachineStatus::Ready,
        environment_id: None,
        peer_subnet: "10.100.0.0/24".parse().unwrap(),
        created_at: Utc::now(),
    };
    store.insert_machine(&manual).await.unwrap();

    reconciler.reconcile_once().await.unwrap();
    assert_eq!(count_ready(&store).await, 1);
    assert!(provider.destroyed.lock().is_empty());
}
