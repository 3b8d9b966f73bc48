// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn override_attaches_default_network() {
    let content = override_content("dev");
    assert!(content.contains("name: cilo-dev"));
    assert!(content.contains("external: true"));
    // Full-file regeneration: rendering twice is identical
    assert_eq!(content, override_content("dev"));
}

#[parameterized(
    docker_style = { "cilo-dev", "cilo-dev-web-1", '-', Some("web") },
    docker_multi_word = { "cilo-dev", "cilo-dev-api-gateway-1", '-', Some("api-gateway") },
    podman_style = { "cilo-dev", "cilo-dev_db_1", '_', Some("db") },
    no_index = { "cilo-dev", "cilo-dev-web", '-', Some("web") },
    foreign_project = { "cilo-dev", "other-web-1", '-', None },
    bare_project = { "cilo-dev", "cilo-dev", '-', None },
)]
fn container_name_to_service(
    project: &str,
    container: &str,
    separator: char,
    expected: Option<&str>,
) {
    assert_eq!(
        service_from_container_name(project, container, separator).as_deref(),
        expected
    );
}

#[test]
fn ps_parsing_accepts_ndjson() {
    let out = concat!(
        r#"{"Service":"web","State":"running"}"#,
        "\n",
        r#"{"Service":"db","State":"exited"}"#,
    );
    let states = parse_ps_output(out);
    assert_eq!(states.len(), 2);
    assert_eq!(states[0], ServiceState { name: "web".into(), state: "running".into() });
    assert_eq!(states[1], ServiceState { name: "db".into(), state: "exited".into() });
}

#[test]
fn ps_parsing_accepts_array_form() {
    let out = r#"[{"service":"web","state":"running"}]"#;
    let states = parse_ps_output(out);
    assert_eq!(states, vec![ServiceState { name: "web".into(), state: "running".into() }]);
}

#[test]
fn ps_parsing_ignores_garbage() {
    assert!(parse_ps_output("").is_empty());
    assert!(parse_ps_output("not json at all").is_empty());
}

#[test]
fn compose_args_include_both_files_and_project() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("compose.yaml");
    let desc = EnvironmentDescription {
        source_dir: dir.path().to_path_buf(),
        source_file: Some(file.clone()),
        format: "compose".to_string(),
        ..Default::default()
    };
    let cli = ComposeCli::docker();
    let args = cli.compose_args(&desc, "dev");
    assert_eq!(args[0], "compose");
    let joined = args.join(" ");
    assert!(joined.contains("-p cilo-dev"), "{joined}");
    assert!(joined.contains(&file.display().to_string()), "{joined}");
    assert!(joined.contains(OVERRIDE_FILE), "{joined}");
}

#[test]
fn podman_prefix_has_no_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let desc = EnvironmentDescription {
        source_dir: dir.path().to_path_buf(),
        source_file: None,
        format: "compose".to_string(),
        ..Default::default()
    };
    let cli = ComposeCli::podman();
    let args = cli.compose_args(&desc, "dev");
    // podman-compose is a single binary; args start at -p
    assert_eq!(args[0], "-p");
    assert_eq!(cli.compose_bin(), "podman-compose");
}

#[test]
fn detect_rejects_unknown_override() {
    let err = ComposeCli::detect(Some("lxc")).unwrap_err();
    assert!(matches!(err, RuntimeError::ToolMissing(t) if t == "lxc"));
}
