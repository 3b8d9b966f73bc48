// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local bring-up scenario: compose project → service records → rendered
//! name-resolution config.

use chrono::Utc;
use cilo::resolver::render::render;
use cilo_core::{Machine, MachineId, MachineStatus, Provider, Service};
use cilo_engine::ParserRegistry;
use cilo_server::lifecycle::{create_environment, report_services};
use cilo_server::{Store, SubnetAllocator};
use cilo_wire::CreateEnvironmentRequest;

const COMPOSE: &str = r#"
services:
  web:
    image: nginx:alpine
    labels:
      cilo.ingress: "true"
  db:
    image: postgres:16-alpine
"#;

#[tokio::test]
async fn local_bring_up_publishes_every_name() {
    // Parse the reference project
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("compose.yaml"), COMPOSE).unwrap();
    let desc = ParserRegistry::with_defaults().parse(dir.path()).unwrap();
    assert_eq!(desc.ingress_service().map(|s| s.name.as_str()), Some("web"));

    // Place the environment
    let store = Store::open(":memory:").await.unwrap();
    store
        .insert_machine(&Machine {
            id: MachineId::from_string("mch-1"),
            provider: Provider::Manual,
            address: "203.0.113.1".to_string(),
            endpoint: "203.0.113.1:51820".to_string(),
            public_key: "pk".to_string(),
            status: MachineStatus::Ready,
            environment_id: None,
            peer_subnet: "10.100.0.0/24".parse().unwrap(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    let allocator = SubnetAllocator::new("10.224.0.0/16".parse().unwrap()).unwrap();
    let (env, _) = create_environment(
        &store,
        &allocator,
        "team-1",
        &CreateEnvironmentRequest {
            name: "dev".to_string(),
            project: Some("app".to_string()),
            format: "compose".to_string(),
            origin: cilo_core::Origin::Interactive,
            ttl_seconds: None,
        },
        Utc::now(),
    )
    .await
    .unwrap();
    let subnet = env.subnet;

    // Report the services with addresses inside the allocated subnet
    let web_ip = cilo_core::subnet::nth_host(subnet, 2).unwrap();
    let db_ip = cilo_core::subnet::nth_host(subnet, 3).unwrap();
    let services: Vec<Service> = desc
        .services
        .iter()
        .map(|spec| Service {
            name: spec.name.clone(),
            image: spec.image.clone(),
            ip: Some(if spec.name == "web" { web_ip } else { db_ip }),
            ports: Vec::new(),
            ingress: spec.is_ingress(),
            hostnames: spec.extra_hostnames(),
        })
        .collect();
    report_services(&store, &env.id, &services).await.unwrap();

    // Render the resolver config from the canonical server list
    let environments = store.list_environments("team-1").await.unwrap();
    let config =
        render(&environments, "test", &["1.1.1.1".to_string()]).unwrap();

    assert!(config.contains(&format!("address=/web.dev.test/{web_ip}\n")));
    assert!(config.contains(&format!("address=/db.dev.test/{db_ip}\n")));
    // Apex and wildcard resolve to the ingress service
    assert!(config.contains(&format!("address=/app.dev.test/{web_ip}\n")));
    assert!(config.contains(&format!("address=/dev.test/{web_ip}\n")));

    // Both service addresses sit inside the environment subnet
    assert!(subnet.contains(&web_ip));
    assert!(subnet.contains(&db_ip));
}

#[tokio::test]
async fn destroyed_environments_leave_no_names_behind() {
    let store = Store::open(":memory:").await.unwrap();
    store
        .insert_machine(&Machine {
            id: MachineId::from_string("mch-1"),
            provider: Provider::Manual,
            address: "203.0.113.1".to_string(),
            endpoint: "203.0.113.1:51820".to_string(),
            public_key: "pk".to_string(),
            status: MachineStatus::Ready,
            environment_id: None,
            peer_subnet: "10.100.0.0/24".parse().unwrap(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    let allocator = SubnetAllocator::new("10.224.0.0/16".parse().unwrap()).unwrap();
    let (env, _) = create_environment(
        &store,
        &allocator,
        "team-1",
        &CreateEnvironmentRequest {
            name: "dev".to_string(),
            project: None,
            format: "compose".to_string(),
            origin: cilo_core::Origin::Interactive,
            ttl_seconds: None,
        },
        Utc::now(),
    )
    .await
    .unwrap();
    report_services(
        &store,
        &env.id,
        &[Service {
            name: "web".to_string(),
            ip: Some("10.224.1.2".parse().unwrap()),
            ..Default::default()
        }],
    )
    .await
    .unwrap();

    cilo_server::lifecycle::destroy_environment(&store, None, &env.id).await.unwrap();

    // The renderer consumes the live list; nothing of dev remains
    let environments = store.list_environments("team-1").await.unwrap();
    let config = render(&environments, "test", &["1.1.1.1".to_string()]).unwrap();
    assert!(!config.contains("dev.test"));
}
