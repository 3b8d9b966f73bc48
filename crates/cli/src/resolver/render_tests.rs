// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cilo_core::{EnvironmentId, EnvironmentStatus, Origin, Service};

fn service(name: &str, ip: &str, ingress: bool) -> Service {
    Service {
        name: name.to_string(),
        ip: Some(ip.parse().unwrap()),
        ingress,
        ..Default::default()
    }
}

fn environment(name: &str, project: Option<&str>, services: Vec<Service>) -> Environment {
    Environment {
        id: EnvironmentId::from_string("env-test"),
        name: name.to_string(),
        team_id: "team-1".to_string(),
        project: project.map(str::to_string),
        format: "compose".to_string(),
        machine_id: None,
        status: EnvironmentStatus::Running,
        subnet: "10.224.1.0/24".parse().unwrap(),
        services,
        peers: Vec::new(),
        origin: Origin::Interactive,
        created_at: chrono::Utc::now(),
        expires_at: None,
    }
}

fn upstreams() -> Vec<String> {
    vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()]
}

#[test]
fn reference_environment_renders_all_records() {
    let env = environment(
        "dev",
        Some("app"),
        vec![
            service("web", "10.224.1.2", true),
            service("db", "10.224.1.3", false),
        ],
    );
    let config = render(&[env], "test", &upstreams()).unwrap();

    assert!(config.contains("server=1.1.1.1\n"));
    assert!(config.contains("server=8.8.8.8\n"));
    assert!(config.contains("address=/web.dev.test/10.224.1.2\n"));
    assert!(config.contains("address=/db.dev.test/10.224.1.3\n"));
    // Apex and wildcard both resolve to the ingress address
    assert!(config.contains("address=/app.dev.test/10.224.1.2\n"));
    assert!(config.contains("address=/dev.test/10.224.1.2\n"));
    assert!(config.contains("port=5354"));
}

#[test]
fn upstreams_precede_address_directives() {
    let env = environment("dev", None, vec![service("web", "10.224.1.2", false)]);
    let config = render(&[env], "test", &upstreams()).unwrap();
    let server_pos = config.find("server=").unwrap();
    let address_pos = config.find("address=").unwrap();
    assert!(server_pos < address_pos);
}

#[test]
fn rendering_is_deterministic_and_from_scratch() {
    let envs = vec![
        environment("b", None, vec![service("api", "10.224.2.2", false)]),
        environment("a", None, vec![service("api", "10.224.1.2", false)]),
    ];
    let first = render(&envs, "test", &upstreams()).unwrap();
    let second = render(&envs, "test", &upstreams()).unwrap();
    assert_eq!(first, second);

    // Dropping an environment drops its records entirely
    let reduced = render(&envs[..1], "test", &upstreams()).unwrap();
    assert!(!reduced.contains("api.a.test"));
    assert!(reduced.contains("api.b.test"));
}

#[test]
fn custom_hostnames_are_published() {
    let mut svc = service("api", "10.224.1.5", false);
    svc.hostnames = vec!["api-internal".to_string(), "legacy".to_string()];
    let env = environment("dev", None, vec![svc]);
    let config = render(&[env], "test", &upstreams()).unwrap();
    assert!(config.contains("address=/api-internal.dev.test/10.224.1.5\n"));
    assert!(config.contains("address=/legacy.dev.test/10.224.1.5\n"));
}

#[test]
fn conflicting_names_are_rejected_before_write() {
    let mut a = service("web", "10.224.1.2", false);
    a.hostnames = vec!["shared".to_string()];
    let mut b = service("db", "10.224.1.3", false);
    b.hostnames = vec!["shared".to_string()];
    let env = environment("dev", None, vec![a, b]);

    let err = render(&[env], "test", &upstreams()).unwrap_err();
    match err {
        ResolverError::Conflict { name, first, second } => {
            assert_eq!(name, "shared.dev.test");
            assert_ne!(first, second);
        }
        other => panic!("expected Conflict, got {other}"),
    }
}

#[test]
fn same_name_same_ip_is_not_a_conflict() {
    let mut web = service("web", "10.224.1.2", true);
    web.hostnames = vec!["app".to_string()];
    // Project apex "app.dev.test" and hostname "app.dev.test" agree on the IP
    let env = environment("dev", Some("app"), vec![web]);
    let config = render(&[env], "test", &upstreams()).unwrap();
    assert_eq!(config.matches("address=/app.dev.test/").count(), 1);
}

#[test]
fn services_without_addresses_are_skipped() {
    let mut stopped = Service { name: "worker".to_string(), ..Default::default() };
    stopped.ingress = true;
    let env = environment("dev", Some("app"), vec![stopped]);
    let config = render(&[env], "test", &upstreams()).unwrap();
    assert!(!config.contains("worker.dev.test"));
    // No ingress address means no wildcard either
    assert!(!config.contains("address=/dev.test/"));
}

#[test]
fn empty_environment_list_renders_forwarders_only() {
    let config = render(&[], "test", &upstreams()).unwrap();
    assert!(config.contains("server=1.1.1.1"));
    assert!(!config.contains("address="));
}
