// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placement scenarios: name collision, machine exhaustion, subnet
//! collision against host routes, idempotent teardown.

use chrono::Utc;
use cilo_core::{Environment, EnvironmentStatus, Machine, MachineId, MachineStatus, Provider};
use cilo_server::lifecycle::{create_environment, destroy_environment};
use cilo_server::{ServerError, Store, SubnetAllocator};
use cilo_wire::CreateEnvironmentRequest;

fn ready_machine(id: &str) -> Machine {
    Machine {
        id: MachineId::from_string(id),
        provider: Provider::Manual,
        address: "203.0.113.1".to_string(),
        endpoint: "203.0.113.1:51820".to_string(),
        public_key: "pk".to_string(),
        status: MachineStatus::Ready,
        environment_id: None,
        peer_subnet: "10.100.0.0/24".parse().unwrap(),
        created_at: Utc::now(),
    }
}

fn request(name: &str) -> CreateEnvironmentRequest {
    CreateEnvironmentRequest {
        name: name.to_string(),
        project: Some("app".to_string()),
        format: "compose".to_string(),
        origin: cilo_core::Origin::Interactive,
        ttl_seconds: None,
    }
}

fn allocator() -> SubnetAllocator {
    SubnetAllocator::new("10.224.0.0/16".parse().unwrap()).unwrap()
}

async fn store_with_machines(n: usize) -> Store {
    let store = Store::open(":memory:").await.unwrap();
    for i in 0..n {
        store.insert_machine(&ready_machine(&format!("mch-{i}"))).await.unwrap();
    }
    store
}

async fn create(store: &Store, name: &str) -> Result<Environment, ServerError> {
    create_environment(store, &allocator(), "team-1", &request(name), Utc::now())
        .await
        .map(|(env, _)| env)
}

#[tokio::test]
async fn name_collision_returns_conflict_and_consumes_nothing() {
    let store = store_with_machines(2).await;
    create(&store, "dev").await.unwrap();

    let err = create(&store, "dev").await.unwrap_err();
    assert_eq!(err.to_string(), "name conflict");
    assert_eq!(err.kind().http_status(), 409);

    // Neither a machine nor a subnet was taken by the losing call
    assert_eq!(store.list_assignable_machines().await.unwrap().len(), 1);
    assert_eq!(store.list_active_subnets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn machine_exhaustion_then_destroy_then_retry_succeeds() {
    let store = store_with_machines(1).await;
    let env = create(&store, "dev").await.unwrap();

    let err = create(&store, "second").await.unwrap_err();
    assert_eq!(err.to_string(), "no capacity");
    assert_eq!(err.kind().http_status(), 503);

    destroy_environment(&store, None, &env.id).await.unwrap();
    create(&store, "second").await.unwrap();
}

#[tokio::test]
async fn foreign_routes_shift_subnet_allocation() {
    // The host routing table already carries the first candidate
    let taken: ipnet::Ipv4Net = "10.224.1.0/24".parse().unwrap();
    let subnet = allocator().allocate(&[], &[taken]).unwrap();
    assert_eq!(subnet, "10.224.2.0/24".parse().unwrap());
}

#[tokio::test]
async fn teardown_is_idempotent_and_total() {
    let store = store_with_machines(1).await;
    let env = create(&store, "dev").await.unwrap();
    let machine_id = env.machine_id.unwrap();

    destroy_environment(&store, None, &env.id).await.unwrap();
    destroy_environment(&store, None, &env.id).await.unwrap();

    let machine = store.get_machine(&machine_id).await.unwrap().unwrap();
    assert_eq!(machine.status, MachineStatus::Ready);
    assert!(machine.environment_id.is_none());

    let gone = store.get_environment(&env.id).await.unwrap().unwrap();
    assert_eq!(gone.status, EnvironmentStatus::Destroyed);
    assert!(gone.peers.is_empty());
}

#[tokio::test]
async fn concurrent_creates_share_no_machine() {
    let store = store_with_machines(1).await;
    // Two placements race for the single machine
    let a = create(&store, "left").await;
    let b = create(&store, "right").await;
    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1);
}
