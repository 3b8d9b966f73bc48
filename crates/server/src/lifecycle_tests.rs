// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cilo_core::{MachineId, MachineStatus, Provider};

async fn store() -> Store {
    Store::open(":memory:").await.unwrap()
}

fn allocator() -> SubnetAllocator {
    SubnetAllocator::new("10.224.0.0/16".parse().unwrap()).unwrap()
}

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

#[tokio::test]
async fn create_places_on_a_ready_machine() {
    let store = store().await;
    store.insert_machine(&ready_machine("mch-1")).await.unwrap();

    let (env, machine) =
        create_environment(&store, &allocator(), "team-1", &request("dev"), Utc::now())
            .await
            .unwrap();
    assert_eq!(env.status, EnvironmentStatus::Provisioning);
    assert_eq!(env.machine_id, Some(machine.id));
    assert_eq!(env.subnet.prefix_len(), 24);

    let stored_machine = store.get_machine(&machine.id).await.unwrap().unwrap();
    assert_eq!(stored_machine.status, MachineStatus::Assigned);
    assert_eq!(stored_machine.environment_id, Some(env.id));
}

#[tokio::test]
async fn create_with_no_machines_is_no_capacity() {
    let store = store().await;
    let err = create_environment(&store, &allocator(), "team-1", &request("dev"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::NoCapacity));
}

#[tokio::test]
async fn create_rejects_invalid_names_before_any_write() {
    let store = store().await;
    store.insert_machine(&ready_machine("mch-1")).await.unwrap();
    let err = create_environment(&store, &allocator(), "team-1", &request("my env"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Validation(_)));
    // Nothing was allocated or assigned
    assert!(store.list_active_subnets().await.unwrap().is_empty());
    let m = store.get_machine(&MachineId::from_string("mch-1")).await.unwrap().unwrap();
    assert!(m.is_assignable());
}

#[tokio::test]
async fn duplicate_name_is_a_conflict_without_allocation() {
    let store = store().await;
    store.insert_machine(&ready_machine("mch-1")).await.unwrap();
    store.insert_machine(&ready_machine("mch-2")).await.unwrap();

    create_environment(&store, &allocator(), "team-1", &request("dev"), Utc::now())
        .await
        .unwrap();
    let err = create_environment(&store, &allocator(), "team-1", &request("dev"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::NameConflict));
    assert_eq!(err.to_string(), "name conflict");

    // The second machine was not consumed
    let m2 = store.get_machine(&MachineId::from_string("mch-2")).await.unwrap().unwrap();
    assert!(m2.is_assignable());
    assert_eq!(store.list_active_subnets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn same_name_different_team_is_fine() {
    let store = store().await;
    store.insert_machine(&ready_machine("mch-1")).await.unwrap();
    store.insert_machine(&ready_machine("mch-2")).await.unwrap();

    create_environment(&store, &allocator(), "team-1", &request("dev"), Utc::now())
        .await
        .unwrap();
    create_environment(&store, &allocator(), "team-2", &request("dev"), Utc::now())
        .await
        .unwrap();
}

#[tokio::test]
async fn machine_exhaustion_then_destroy_then_retry() {
    let store = store().await;
    store.insert_machine(&ready_machine("mch-1")).await.unwrap();

    let (env, _) = create_environment(&store, &allocator(), "team-1", &request("dev"), Utc::now())
        .await
        .unwrap();

    // Pool of one, one environment running: next create is 503
    let err = create_environment(&store, &allocator(), "team-1", &request("other"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::NoCapacity));

    destroy_environment(&store, None, &env.id).await.unwrap();

    // Machine freed; the retry succeeds
    create_environment(&store, &allocator(), "team-1", &request("other"), Utc::now())
        .await
        .unwrap();
}

#[tokio::test]
async fn destroy_is_idempotent_and_frees_everything() {
    let store = store().await;
    store.insert_machine(&ready_machine("mch-1")).await.unwrap();
    let (env, machine) =
        create_environment(&store, &allocator(), "team-1", &request("dev"), Utc::now())
            .await
            .unwrap();

    destroy_environment(&store, None, &env.id).await.unwrap();
    destroy_environment(&store, None, &env.id).await.unwrap();

    let stored = store.get_environment(&env.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EnvironmentStatus::Destroyed);
    assert!(stored.machine_id.is_none());
    assert!(stored.peers.is_empty());

    let m = store.get_machine(&machine.id).await.unwrap().unwrap();
    assert_eq!(m.status, MachineStatus::Ready);
    assert!(m.environment_id.is_none());
}

#[tokio::test]
async fn destroy_unknown_environment_is_not_found() {
    let store = store().await;
    let err = destroy_environment(&store, None, &EnvironmentId::from_string("env-none"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::NotFound(_)));
}

#[tokio::test]
async fn subnets_do_not_repeat_across_live_environments() {
    let store = store().await;
    for i in 0..3 {
        store.insert_machine(&ready_machine(&format!("mch-{i}"))).await.unwrap();
    }
    let mut seen = Vec::new();
    for name in ["a", "b", "c"] {
        let (env, _) =
            create_environment(&store, &allocator(), "team-1", &request(name), Utc::now())
                .await
                .unwrap();
        assert!(!seen.contains(&env.subnet));
        seen.push(env.subnet);
    }
}

#[tokio::test]
async fn report_services_walks_to_running() {
    let store = store().await;
    store.insert_machine(&ready_machine("mch-1")).await.unwrap();
    let (env, _) = create_environment(&store, &allocator(), "team-1", &request("dev"), Utc::now())
        .await
        .unwrap();

    sync_environment(&store, &env.id).await.unwrap();
    let services = vec![Service {
        name: "web".to_string(),
        ip: Some("10.224.1.2".parse().unwrap()),
        ingress: true,
        ..Default::default()
    }];
    report_services(&store, &env.id, &services).await.unwrap();

    let stored = store.get_environment(&env.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EnvironmentStatus::Running);
    assert_eq!(stored.services.len(), 1);
    assert!(stored.placement_consistent());
}

#[tokio::test]
async fn report_services_on_destroying_environment_conflicts() {
    let store = store().await;
    store.insert_machine(&ready_machine("mch-1")).await.unwrap();
    let (env, _) = create_environment(&store, &allocator(), "team-1", &request("dev"), Utc::now())
        .await
        .unwrap();
    store
        .transition_environment(&env.id, EnvironmentStatus::Provisioning, EnvironmentStatus::Destroying)
        .await
        .unwrap();

    let err = report_services(&store, &env.id, &[]).await.unwrap_err();
    assert!(matches!(err, ServerError::Conflict(_)));
}

#[tokio::test]
async fn fail_environment_releases_the_machine() {
    let store = store().await;
    store.insert_machine(&ready_machine("mch-1")).await.unwrap();
    let (env, machine) =
        create_environment(&store, &allocator(), "team-1", &request("dev"), Utc::now())
            .await
            .unwrap();

    fail_environment(&store, &env.id).await.unwrap();

    let stored = store.get_environment(&env.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EnvironmentStatus::Error);
    let m = store.get_machine(&machine.id).await.unwrap().unwrap();
    assert_eq!(m.status, MachineStatus::Ready);

    // Only destroying leads out of error
    destroy_environment(&store, None, &env.id).await.unwrap();
    let stored = store.get_environment(&env.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EnvironmentStatus::Destroyed);
}
