// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use cilo_core::{
    Credential, Environment, EnvironmentId, EnvironmentStatus, Machine, MachineId, MachineStatus,
    Origin, Peer, PeerId, Provider, Scope, Service,
};

async fn store() -> Store {
    Store::open(":memory:").await.unwrap()
}

fn machine(id: &str) -> Machine {
    Machine {
        id: MachineId::from_string(id),
        provider: Provider::Manual,
        address: "203.0.113.1".to_string(),
        endpoint: "203.0.113.1:51820".to_string(),
        public_key: format!("{id}-pk"),
        status: MachineStatus::Ready,
        environment_id: None,
        peer_subnet: "10.100.0.0/24".parse().unwrap(),
        created_at: Utc::now(),
    }
}

fn environment(id: &str, name: &str, subnet: &str) -> Environment {
    Environment {
        id: EnvironmentId::from_string(id),
        name: name.to_string(),
        team_id: "team-1".to_string(),
        project: Some("app".to_string()),
        format: "compose".to_string(),
        machine_id: None,
        status: EnvironmentStatus::Provisioning,
        subnet: subnet.parse().unwrap(),
        services: Vec::new(),
        peers: Vec::new(),
        origin: Origin::Interactive,
        created_at: Utc::now(),
        expires_at: None,
    }
}

#[tokio::test]
async fn environment_round_trip() {
    let store = store().await;
    store.insert_machine(&machine("mch-1")).await.unwrap();
    let mut env = environment("env-1", "dev", "10.224.1.0/24");
    env.services.push(Service {
        name: "web".to_string(),
        image: Some("nginx:alpine".to_string()),
        ip: Some("10.224.1.2".parse().unwrap()),
        ingress: true,
        ..Default::default()
    });
    assert!(store
        .insert_environment_assigning(&env, &MachineId::from_string("mch-1"))
        .await
        .unwrap());

    let loaded = store.get_environment(&env.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "dev");
    assert_eq!(loaded.subnet, env.subnet);
    assert_eq!(loaded.machine_id, Some(MachineId::from_string("mch-1")));
    assert_eq!(loaded.services.len(), 1);
    assert!(loaded.services[0].ingress);
    assert_eq!(loaded.origin, Origin::Interactive);
}

#[tokio::test]
async fn machine_assignment_has_one_winner() {
    let store = store().await;
    store.insert_machine(&machine("mch-1")).await.unwrap();

    let first = environment("env-1", "dev", "10.224.1.0/24");
    let second = environment("env-2", "staging", "10.224.2.0/24");
    let id = MachineId::from_string("mch-1");

    assert!(store.insert_environment_assigning(&first, &id).await.unwrap());
    // The machine is taken; the second placement loses the conditional update
    assert!(!store.insert_environment_assigning(&second, &id).await.unwrap());
    assert!(store.get_environment(&second.id).await.unwrap().is_none());
}

#[tokio::test]
async fn active_name_conflicts_are_unique_violations() {
    let store = store().await;
    store.insert_machine(&machine("mch-1")).await.unwrap();
    store.insert_machine(&machine("mch-2")).await.unwrap();

    let first = environment("env-1", "dev", "10.224.1.0/24");
    assert!(store
        .insert_environment_assigning(&first, &MachineId::from_string("mch-1"))
        .await
        .unwrap());

    let dup = environment("env-2", "dev", "10.224.2.0/24");
    let err = store
        .insert_environment_assigning(&dup, &MachineId::from_string("mch-2"))
        .await
        .unwrap_err();
    assert!(is_unique_violation(&err), "{err}");
    // The losing transaction rolled back the machine assignment
    let m2 = store.get_machine(&MachineId::from_string("mch-2")).await.unwrap().unwrap();
    assert!(m2.is_assignable());
}

#[tokio::test]
async fn destroyed_names_are_reusable() {
    let store = store().await;
    store.insert_machine(&machine("mch-1")).await.unwrap();
    store.insert_machine(&machine("mch-2")).await.unwrap();

    let first = environment("env-1", "dev", "10.224.1.0/24");
    let id1 = first.id;
    assert!(store
        .insert_environment_assigning(&first, &MachineId::from_string("mch-1"))
        .await
        .unwrap());
    assert!(store
        .transition_environment(&id1, EnvironmentStatus::Provisioning, EnvironmentStatus::Destroying)
        .await
        .unwrap());
    assert!(store
        .transition_environment(&id1, EnvironmentStatus::Destroying, EnvironmentStatus::Destroyed)
        .await
        .unwrap());

    let again = environment("env-2", "dev", "10.224.2.0/24");
    assert!(store
        .insert_environment_assigning(&again, &MachineId::from_string("mch-2"))
        .await
        .unwrap());
}

#[tokio::test]
async fn conditional_transitions_reject_stale_writers() {
    let store = store().await;
    store.insert_machine(&machine("mch-1")).await.unwrap();
    let env = environment("env-1", "dev", "10.224.1.0/24");
    store
        .insert_environment_assigning(&env, &MachineId::from_string("mch-1"))
        .await
        .unwrap();

    assert!(store
        .transition_environment(&env.id, EnvironmentStatus::Provisioning, EnvironmentStatus::Syncing)
        .await
        .unwrap());
    // A second writer still thinking the env is provisioning loses
    assert!(!store
        .transition_environment(&env.id, EnvironmentStatus::Provisioning, EnvironmentStatus::Syncing)
        .await
        .unwrap());
}

#[tokio::test]
async fn machine_release_is_idempotent() {
    let store = store().await;
    store.insert_machine(&machine("mch-1")).await.unwrap();
    let env = environment("env-1", "dev", "10.224.1.0/24");
    let mid = MachineId::from_string("mch-1");
    store.insert_environment_assigning(&env, &mid).await.unwrap();

    assert!(store.release_machine(&mid, &env.id).await.unwrap());
    // Second release matches no row and reports false without error
    assert!(!store.release_machine(&mid, &env.id).await.unwrap());
    let m = store.get_machine(&mid).await.unwrap().unwrap();
    assert_eq!(m.status, MachineStatus::Ready);
    assert!(m.environment_id.is_none());
}

#[tokio::test]
async fn peer_uniqueness_per_machine() {
    let store = store().await;
    let peer = Peer {
        id: PeerId::from_string("per-1"),
        user: "alice".to_string(),
        public_key: "pk-a".to_string(),
        ip: "10.100.0.2".parse().unwrap(),
        environment_id: EnvironmentId::from_string("env-1"),
        machine_id: MachineId::from_string("mch-1"),
        connected_at: Utc::now(),
    };
    store.insert_peer(&peer).await.unwrap();

    // Same key on the same machine: rejected
    let mut dup_key = peer.clone();
    dup_key.id = PeerId::from_string("per-2");
    dup_key.ip = "10.100.0.3".parse().unwrap();
    assert!(is_unique_violation(&store.insert_peer(&dup_key).await.unwrap_err()));

    // Same IP on the same machine: rejected
    let mut dup_ip = peer.clone();
    dup_ip.id = PeerId::from_string("per-3");
    dup_ip.public_key = "pk-b".to_string();
    assert!(is_unique_violation(&store.insert_peer(&dup_ip).await.unwrap_err()));

    // Same key on another machine: fine
    let mut other_machine = peer.clone();
    other_machine.id = PeerId::from_string("per-4");
    other_machine.machine_id = MachineId::from_string("mch-2");
    store.insert_peer(&other_machine).await.unwrap();
}

#[tokio::test]
async fn peer_removal_returns_the_record() {
    let store = store().await;
    let peer = Peer {
        id: PeerId::from_string("per-1"),
        user: "alice".to_string(),
        public_key: "pk-a".to_string(),
        ip: "10.100.0.2".parse().unwrap(),
        environment_id: EnvironmentId::from_string("env-1"),
        machine_id: MachineId::from_string("mch-1"),
        connected_at: Utc::now(),
    };
    store.insert_peer(&peer).await.unwrap();

    let removed = store.delete_peer_by_key("pk-a").await.unwrap().unwrap();
    assert_eq!(removed.ip, peer.ip);
    assert!(store.delete_peer_by_key("pk-a").await.unwrap().is_none());
}

#[tokio::test]
async fn credential_lookup_by_hash() {
    let store = store().await;
    let (cred, secret) = Credential::generate("team-1", Scope::Developer, Utc::now());
    store.insert_credential(&cred).await.unwrap();

    let found = store
        .find_credential_by_hash(&cilo_core::credential::hash_secret(&secret))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, cred.id);
    assert_eq!(found.scope, Scope::Developer);

    assert!(store
        .find_credential_by_hash(&cilo_core::credential::hash_secret("wrong"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn expired_environments_are_listed() {
    let store = store().await;
    store.insert_machine(&machine("mch-1")).await.unwrap();
    let mut env = environment("env-1", "dev", "10.224.1.0/24");
    env.expires_at = Some(Utc::now() - chrono::Duration::minutes(5));
    store
        .insert_environment_assigning(&env, &MachineId::from_string("mch-1"))
        .await
        .unwrap();

    let expired = store.list_expired(Utc::now()).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, env.id);

    // Once destroying, it no longer shows up
    store
        .transition_environment(&env.id, EnvironmentStatus::Provisioning, EnvironmentStatus::Destroying)
        .await
        .unwrap();
    assert!(store.list_expired(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn active_subnets_listing() {
    let store = store().await;
    store.insert_machine(&machine("mch-1")).await.unwrap();
    store.insert_machine(&machine("mch-2")).await.unwrap();
    store
        .insert_environment_assigning(
            &environment("env-1", "a", "10.224.1.0/24"),
            &MachineId::from_string("mch-1"),
        )
        .await
        .unwrap();
    store
        .insert_environment_assigning(
            &environment("env-2", "b", "10.224.2.0/24"),
            &MachineId::from_string("mch-2"),
        )
        .await
        .unwrap();

    let subnets = store.list_active_subnets().await.unwrap();
    assert_eq!(subnets.len(), 2);
    assert!(subnets.contains(&"10.224.1.0/24".parse().unwrap()));
}
