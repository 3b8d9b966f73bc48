// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::description::ServiceSpec;

/// Parser that detects a marker file, for registry-order tests.
struct MarkerParser {
    format: &'static str,
    marker: &'static str,
}

impl Parser for MarkerParser {
    fn format(&self) -> &'static str {
        self.format
    }

    fn detect(&self, dir: &Path) -> bool {
        dir.join(self.marker).is_file()
    }

    fn parse(&self, dir: &Path) -> Result<EnvironmentDescription, EngineError> {
        Ok(EnvironmentDescription {
            source_dir: dir.to_path_buf(),
            format: self.format.to_string(),
            services: vec![ServiceSpec { name: "app".to_string(), ..Default::default() }],
            ..Default::default()
        })
    }
}

#[test]
fn first_detecting_parser_wins() {
    let mut registry = ParserRegistry::empty();
    registry.register(Box::new(MarkerParser { format: "specific", marker: "marker" }));
    registry.register(Box::new(MarkerParser { format: "generic", marker: "marker" }));

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker"), "").unwrap();
    let parser = registry.detect(dir.path()).unwrap();
    assert_eq!(parser.format(), "specific");
}

#[test]
fn undetected_directory_is_no_parser() {
    let registry = ParserRegistry::with_defaults();
    let dir = tempfile::tempdir().unwrap();
    let err = registry.parse(dir.path()).unwrap_err();
    assert!(matches!(err, EngineError::NoParser(_)));
}

#[test]
fn defaults_register_compose() {
    let registry = ParserRegistry::with_defaults();
    assert!(registry.by_format("compose").is_some());
    assert!(registry.by_format("devcontainer").is_none());
}

#[test]
fn detect_then_parse_round_trip() {
    let registry = ParserRegistry::with_defaults();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("docker-compose.yml"),
        "services:\n  app:\n    image: busybox\n",
    )
    .unwrap();
    let desc = registry.parse(dir.path()).unwrap();
    assert_eq!(desc.format, "compose");
    assert_eq!(desc.services.len(), 1);
}
