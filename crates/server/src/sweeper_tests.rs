// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lifecycle::create_environment;
use crate::subnet::SubnetAllocator;
use chrono::Utc;
use cilo_core::{
    EnvironmentStatus, FakeClock, Machine, MachineId, MachineStatus, Provider,
};
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

#[tokio::test]
async fn expired_environments_get_destroyed_and_others_stay() {
    let store = Store::open(":memory:").await.unwrap();
    store.insert_machine(&ready_machine("mch-1")).await.unwrap();
    store.insert_machine(&ready_machine("mch-2")).await.unwrap();
    let allocator = SubnetAllocator::new("10.224.0.0/16".parse().unwrap()).unwrap();
    let clock = FakeClock::new();

    let (short_lived, _) = create_environment(
        &store,
        &allocator,
        "team-1",
        &CreateEnvironmentRequest {
            name: "ephemeral".to_string(),
            project: None,
            format: "compose".to_string(),
            origin: cilo_core::Origin::Automated,
            ttl_seconds: Some(60),
        },
        clock.now(),
    )
    .await
    .unwrap();

    let (long_lived, _) = create_environment(
        &store,
        &allocator,
        "team-1",
        &CreateEnvironmentRequest {
            name: "durable".to_string(),
            project: None,
            format: "compose".to_string(),
            origin: cilo_core::Origin::Interactive,
            ttl_seconds: None,
        },
        clock.now(),
    )
    .await
    .unwrap();

    let sweeper =
        Sweeper::new(store.clone(), None, clock.clone(), std::time::Duration::from_secs(10));

    // Nothing expired yet
    assert!(sweeper.sweep_once().await.unwrap().is_empty());

    clock.advance(std::time::Duration::from_secs(61));
    let destroyed = sweeper.sweep_once().await.unwrap();
    assert_eq!(destroyed, vec![short_lived.id]);

    let gone = store.get_environment(&short_lived.id).await.unwrap().unwrap();
    assert_eq!(gone.status, EnvironmentStatus::Destroyed);
    let kept = store.get_environment(&long_lived.id).await.unwrap().unwrap();
    assert_eq!(kept.status, EnvironmentStatus::Provisioning);

    // The expired environment's machine came back to the pool
    assert_eq!(store.list_assignable_machines().await.unwrap().len(), 1);

    // A second pass finds nothing left to do
    assert!(sweeper.sweep_once().await.unwrap().is_empty());
}
