// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compose-file parser.
//!
//! Reads the first of `compose.yaml`, `compose.yml`,
//! `docker-compose.yaml`, `docker-compose.yml` and maps it into the
//! neutral description. Both short and long syntax are accepted for
//! ports, volumes, environment, labels, and depends_on; fields with no
//! bearing on container placement are ignored.

use super::{EngineError, Parser};
use crate::description::{
    BuildSpec, CommandSpec, EnvironmentDescription, HealthCheck, NetworkSpec, PortMapping,
    ServiceSpec, VolumeMount, VolumeSpec,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Candidate file names, most specific first.
pub const COMPOSE_FILES: &[&str] =
    &["compose.yaml", "compose.yml", "docker-compose.yaml", "docker-compose.yml"];

#[derive(Default)]
pub struct ComposeParser;

impl ComposeParser {
    pub fn new() -> Self {
        Self
    }

    /// The compose file a directory would be parsed from, if any.
    pub fn find_file(dir: &Path) -> Option<PathBuf> {
        COMPOSE_FILES.iter().map(|f| dir.join(f)).find(|p| p.is_file())
    }
}

impl Parser for ComposeParser {
    fn format(&self) -> &'static str {
        "compose"
    }

    fn detect(&self, dir: &Path) -> bool {
        Self::find_file(dir).is_some()
    }

    fn parse(&self, dir: &Path) -> Result<EnvironmentDescription, EngineError> {
        let file = Self::find_file(dir).ok_or_else(|| EngineError::NoParser(dir.to_path_buf()))?;
        let content = std::fs::read_to_string(&file)?;
        let raw: ComposeFile = serde_yaml::from_str(&content).map_err(|e| EngineError::Parse {
            format: "compose",
            message: e.to_string(),
        })?;
        map_file(raw, dir, &file)
    }
}

fn map_file(
    raw: ComposeFile,
    dir: &Path,
    file: &Path,
) -> Result<EnvironmentDescription, EngineError> {
    if raw.services.is_empty() {
        return Err(EngineError::Parse {
            format: "compose",
            message: "no services defined".to_string(),
        });
    }

    let mut services = Vec::with_capacity(raw.services.len());
    for (name, svc) in raw.services {
        services.push(map_service(name, svc)?);
    }

    let networks = raw
        .networks
        .into_iter()
        .map(|(name, net)| {
            let net = net.unwrap_or_default();
            NetworkSpec {
                name,
                external: net.external.map(|e| e.is_external()).unwrap_or(false),
                subnet: net
                    .ipam
                    .and_then(|i| i.config.into_iter().find_map(|c| c.subnet))
                    .and_then(|s| s.parse().ok()),
            }
        })
        .collect();

    let volumes = raw
        .volumes
        .into_iter()
        .map(|(name, vol)| VolumeSpec {
            name,
            external: vol
                .unwrap_or_default()
                .external
                .map(|e| e.is_external())
                .unwrap_or(false),
        })
        .collect();

    let mut metadata = BTreeMap::new();
    if let Some(name) = raw.name {
        metadata.insert("name".to_string(), name);
    }

    Ok(EnvironmentDescription {
        source_dir: dir.to_path_buf(),
        source_file: Some(file.to_path_buf()),
        format: "compose".to_string(),
        services,
        networks,
        volumes,
        metadata,
    })
}

fn map_service(name: String, raw: RawService) -> Result<ServiceSpec, EngineError> {
    let mut ports = Vec::with_capacity(raw.ports.len());
    for port in raw.ports {
        ports.push(map_port(&name, port)?);
    }

    let volumes = raw.volumes.into_iter().map(map_volume_mount).collect();

    let depends_on = match raw.depends_on {
        None => Vec::new(),
        Some(DependsOn::List(list)) => list,
        Some(DependsOn::Map(map)) => map.into_keys().collect(),
    };

    let networks = match raw.networks {
        None => Vec::new(),
        Some(NetworksField::List(list)) => list,
        Some(NetworksField::Map(map)) => map.into_keys().collect(),
    };

    let healthcheck = raw.healthcheck.and_then(|h| {
        if h.disable {
            return None;
        }
        h.test.map(|test| HealthCheck {
            test,
            interval: h.interval,
            timeout: h.timeout,
            retries: h.retries,
            start_period: h.start_period,
        })
    });

    Ok(ServiceSpec {
        name,
        image: raw.image,
        build: raw.build.map(map_build),
        command: raw.command,
        entrypoint: raw.entrypoint,
        environment: raw.environment.map(ListOrMap::into_map).unwrap_or_default(),
        env_files: raw.env_file.map(StringOrList::into_vec).unwrap_or_default(),
        ports,
        volumes,
        depends_on,
        labels: raw.labels.map(ListOrMap::into_map).unwrap_or_default(),
        healthcheck,
        networks,
        hostname: raw.hostname,
    })
}

fn map_build(raw: RawBuild) -> BuildSpec {
    match raw {
        RawBuild::Context(context) => BuildSpec { context, ..Default::default() },
        RawBuild::Detailed(detail) => BuildSpec {
            context: detail.context.unwrap_or_else(|| ".".to_string()),
            dockerfile: detail.dockerfile,
            args: detail.args.map(ListOrMap::into_map).unwrap_or_default(),
        },
    }
}

/// Short port syntax: `80`, `8080:80`, `127.0.0.1:8080:80`, each with an
/// optional `/proto` suffix. The container port is the last `:` segment.
fn map_port(service: &str, raw: RawPort) -> Result<PortMapping, EngineError> {
    let parse_err = |detail: String| EngineError::Parse {
        format: "compose",
        message: format!("service {service:?}: invalid port {detail}"),
    };
    match raw {
        RawPort::Number(container) => Ok(PortMapping { host: None, container, protocol: None }),
        RawPort::Long(long) => Ok(PortMapping {
            host: long.published.map(|p| match long.host_ip {
                Some(ip) => format!("{}:{}", ip, p.display()),
                None => p.display(),
            }),
            container: long.target,
            protocol: long.protocol,
        }),
        RawPort::Short(spec) => {
            let (addr, protocol) = match spec.split_once('/') {
                Some((addr, proto)) => (addr, Some(proto.to_string())),
                None => (spec.as_str(), None),
            };
            let (host, container_part) = match addr.rsplit_once(':') {
                Some((host, container)) => (Some(host.to_string()), container),
                None => (None, addr),
            };
            // Ranges publish their first port for placement purposes
            let first = container_part.split('-').next().unwrap_or(container_part);
            let container =
                first.parse::<u16>().map_err(|_| parse_err(format!("{spec:?}")))?;
            Ok(PortMapping { host, container, protocol })
        }
    }
}

/// Short volume syntax: `target`, `source:target`, `source:target:mode`.
fn map_volume_mount(raw: RawVolumeMount) -> VolumeMount {
    match raw {
        RawVolumeMount::Long(long) => VolumeMount {
            source: long.source,
            target: long.target,
            read_only: long.read_only,
        },
        RawVolumeMount::Short(spec) => {
            let parts: Vec<&str> = spec.split(':').collect();
            match parts.as_slice() {
                [target] => VolumeMount {
                    source: None,
                    target: (*target).to_string(),
                    read_only: false,
                },
                [source, target] => VolumeMount {
                    source: Some((*source).to_string()),
                    target: (*target).to_string(),
                    read_only: false,
                },
                [source, target, mode, ..] => VolumeMount {
                    source: Some((*source).to_string()),
                    target: (*target).to_string(),
                    read_only: mode.split(',').any(|m| m == "ro"),
                },
                [] => VolumeMount::default(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Raw serde model

#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    #[allow(dead_code)]
    version: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    services: BTreeMap<String, RawService>,
    #[serde(default)]
    networks: BTreeMap<String, Option<RawNetwork>>,
    #[serde(default)]
    volumes: BTreeMap<String, Option<RawVolume>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawService {
    image: Option<String>,
    build: Option<RawBuild>,
    command: Option<CommandSpec>,
    entrypoint: Option<CommandSpec>,
    environment: Option<ListOrMap>,
    env_file: Option<StringOrList>,
    ports: Vec<RawPort>,
    volumes: Vec<RawVolumeMount>,
    depends_on: Option<DependsOn>,
    labels: Option<ListOrMap>,
    healthcheck: Option<RawHealthCheck>,
    networks: Option<NetworksField>,
    hostname: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(v) => v,
        }
    }
}

/// Environment/labels/build-args: either `["K=V", "K"]` or `{K: V}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListOrMap {
    List(Vec<String>),
    Map(BTreeMap<String, Option<Scalar>>),
}

impl ListOrMap {
    fn into_map(self) -> BTreeMap<String, String> {
        match self {
            ListOrMap::List(list) => list
                .into_iter()
                .map(|entry| match entry.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (entry, String::new()),
                })
                .collect(),
            ListOrMap::Map(map) => map
                .into_iter()
                .map(|(k, v)| (k, v.map(|s| s.display()).unwrap_or_default()))
                .collect(),
        }
    }
}

/// YAML scalars show up as strings, numbers, or booleans depending on how
/// the author quoted them; normalize to the string form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    String(String),
    Number(serde_yaml::Number),
    Bool(bool),
}

impl Scalar {
    fn display(&self) -> String {
        match self {
            Scalar::String(s) => s.clone(),
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBuild {
    Context(String),
    Detailed(RawBuildDetail),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBuildDetail {
    context: Option<String>,
    dockerfile: Option<String>,
    args: Option<ListOrMap>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u16),
    Short(String),
    Long(RawPortLong),
}

#[derive(Debug, Deserialize)]
struct RawPortLong {
    target: u16,
    #[serde(default)]
    published: Option<Scalar>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    host_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVolumeMount {
    Short(String),
    Long(RawVolumeLong),
}

#[derive(Debug, Deserialize)]
struct RawVolumeLong {
    #[serde(default)]
    source: Option<String>,
    target: String,
    #[serde(default)]
    read_only: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DependsOn {
    List(Vec<String>),
    Map(BTreeMap<String, DependsOnDetail>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DependsOnDetail {
    #[allow(dead_code)]
    condition: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NetworksField {
    List(Vec<String>),
    Map(BTreeMap<String, Option<ServiceNetworkDetail>>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceNetworkDetail {
    #[allow(dead_code)]
    aliases: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHealthCheck {
    test: Option<CommandSpec>,
    interval: Option<String>,
    timeout: Option<String>,
    retries: Option<u32>,
    start_period: Option<String>,
    disable: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNetwork {
    external: Option<ExternalField>,
    #[allow(dead_code)]
    name: Option<String>,
    ipam: Option<RawIpam>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExternalField {
    Bool(bool),
    Named {
        #[allow(dead_code)]
        name: String,
    },
}

impl ExternalField {
    fn is_external(&self) -> bool {
        match self {
            ExternalField::Bool(b) => *b,
            ExternalField::Named { .. } => true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIpam {
    config: Vec<RawIpamConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIpamConfig {
    subnet: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVolume {
    external: Option<ExternalField>,
}

#[cfg(test)]
#[path = "compose_tests.rs"]
mod tests;
