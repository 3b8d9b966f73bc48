// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compose-family runtimes driven through the CLI.
//!
//! One implementation covers both families: `docker` + `docker compose`
//! and `podman` + `podman-compose` differ only in the binaries invoked and
//! the container-name separator. Containers are attached to the
//! environment's bridge network through a generated override file, so the
//! user's compose file is never edited.

use super::{
    LogOptions, LogStream, Logs, Runtime, RuntimeError, ServiceRuntimeInfo, ServiceState,
    UpOptions,
};
use crate::description::EnvironmentDescription;
use crate::subprocess::{run_checked, DEFAULT_TIMEOUT, UP_TIMEOUT};
use crate::{network_name, project_name};
use async_trait::async_trait;
use ipnet::Ipv4Net;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Name of the generated network-attachment override inside a workspace.
pub const OVERRIDE_FILE: &str = ".cilo.override.yaml";

/// Compose label identifying the project a container belongs to.
const PROJECT_LABEL: &str = "com.docker.compose.project";

#[derive(Debug, Clone)]
pub struct ComposeCli {
    /// Container engine binary: `docker` or `podman`
    engine: String,
    /// Compose entry point, e.g. `["docker", "compose"]` or `["podman-compose"]`
    compose: Vec<String>,
    /// Container-name separator the compose tool uses
    separator: char,
}

impl ComposeCli {
    pub fn docker() -> Self {
        Self {
            engine: "docker".to_string(),
            compose: vec!["docker".to_string(), "compose".to_string()],
            separator: '-',
        }
    }

    pub fn podman() -> Self {
        Self {
            engine: "podman".to_string(),
            compose: vec!["podman-compose".to_string()],
            separator: '_',
        }
    }

    /// Pick a runtime by probing for binaries, docker first. `force`
    /// overrides detection (`docker` / `podman`).
    pub fn detect(force: Option<&str>) -> Result<Self, RuntimeError> {
        match force {
            Some("docker") => return Ok(Self::docker()),
            Some("podman") => return Ok(Self::podman()),
            Some(other) => return Err(RuntimeError::ToolMissing(other.to_string())),
            None => {}
        }
        if which::which("docker").is_ok() {
            return Ok(Self::docker());
        }
        if which::which("podman").is_ok() && which::which("podman-compose").is_ok() {
            return Ok(Self::podman());
        }
        Err(RuntimeError::ToolMissing("docker or podman".to_string()))
    }

    /// Compose invocation prefix for an environment: project name, project
    /// directory, the project's compose file, and the generated override.
    fn compose_args(&self, desc: &EnvironmentDescription, env: &str) -> Vec<String> {
        let mut args: Vec<String> = self.compose[1..].iter().cloned().collect();
        args.push("-p".to_string());
        args.push(project_name(env));
        if let Some(file) = &desc.source_file {
            args.push("-f".to_string());
            args.push(file.display().to_string());
            args.push("-f".to_string());
            args.push(desc.source_dir.join(OVERRIDE_FILE).display().to_string());
        }
        args.push("--project-directory".to_string());
        args.push(desc.source_dir.display().to_string());
        args
    }

    fn compose_bin(&self) -> &str {
        &self.compose[0]
    }

    async fn run_compose(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
        tail: &[&str],
        timeout: std::time::Duration,
        label: &str,
    ) -> Result<String, RuntimeError> {
        let mut args = self.compose_args(desc, env);
        args.extend(tail.iter().map(|s| s.to_string()));
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        Ok(run_checked(self.compose_bin(), &arg_refs, timeout, label).await?)
    }

    /// Container names in the environment's compose project.
    async fn project_containers(&self, env: &str) -> Result<Vec<String>, RuntimeError> {
        let filter = format!("label={}={}", PROJECT_LABEL, project_name(env));
        let out = run_checked(
            &self.engine,
            &["ps", "-a", "--filter", &filter, "--format", "{{.Names}}"],
            DEFAULT_TIMEOUT,
            "container list",
        )
        .await?;
        Ok(out.lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
    }

    /// Address of a container on the environment network, preferring the
    /// cilo-owned network over any others the container joined.
    async fn container_ip(
        &self,
        container: &str,
        env: &str,
    ) -> Result<Option<std::net::Ipv4Addr>, RuntimeError> {
        let out = run_checked(
            &self.engine,
            &["inspect", "-f", "{{json .NetworkSettings.Networks}}", container],
            DEFAULT_TIMEOUT,
            "container inspect",
        )
        .await?;
        let networks: serde_json::Value =
            serde_json::from_str(&out).map_err(|e| RuntimeError::Malformed {
                tool: self.engine.clone(),
                detail: format!("inspect {container}: {e}"),
            })?;
        let preferred = network_name(env);
        let map = match networks.as_object() {
            Some(map) => map,
            None => return Ok(None),
        };
        let entry = map.get(&preferred).or_else(|| map.values().next());
        Ok(entry
            .and_then(|n| n.get("IPAddress"))
            .and_then(|ip| ip.as_str())
            .and_then(|ip| ip.parse().ok()))
    }
}

#[async_trait]
impl Runtime for ComposeCli {
    fn name(&self) -> &'static str {
        "compose"
    }

    async fn up(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
        opts: &UpOptions,
    ) -> Result<(), RuntimeError> {
        write_override(&desc.source_dir, env).await?;
        let mut tail = vec!["up", "-d"];
        if opts.build {
            tail.push("--build");
        }
        if opts.recreate {
            tail.push("--force-recreate");
        } else {
            tail.push("--no-recreate");
        }
        self.run_compose(desc, env, &tail, UP_TIMEOUT, "compose up").await?;
        tracing::info!(environment = env, runtime = self.engine, "compose project up");
        Ok(())
    }

    async fn down(&self, desc: &EnvironmentDescription, env: &str) -> Result<(), RuntimeError> {
        // Removes containers; the external environment network survives.
        self.run_compose(desc, env, &["down"], DEFAULT_TIMEOUT, "compose down").await?;
        Ok(())
    }

    async fn destroy(&self, desc: &EnvironmentDescription, env: &str) -> Result<(), RuntimeError> {
        // -v drops project and anonymous volumes; external volumes are
        // never owned by the project, so compose leaves them alone.
        self.run_compose(
            desc,
            env,
            &["down", "-v", "--remove-orphans"],
            DEFAULT_TIMEOUT,
            "compose destroy",
        )
        .await?;
        Ok(())
    }

    async fn status(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
    ) -> Result<Vec<ServiceState>, RuntimeError> {
        let out = self
            .run_compose(desc, env, &["ps", "--format", "json"], DEFAULT_TIMEOUT, "compose ps")
            .await?;
        Ok(parse_ps_output(&out))
    }

    async fn services(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
    ) -> Result<Vec<ServiceRuntimeInfo>, RuntimeError> {
        let project = project_name(env);
        let mut out = Vec::new();
        for container in self.project_containers(env).await? {
            let Some(service) = service_from_container_name(&project, &container, self.separator)
            else {
                continue;
            };
            if out.iter().any(|s: &ServiceRuntimeInfo| s.name == service) {
                continue;
            }
            let ip = self.container_ip(&container, env).await?;
            let ports = desc
                .service(&service)
                .map(|s| s.ports.iter().map(|p| p.to_string()).collect())
                .unwrap_or_default();
            out.push(ServiceRuntimeInfo { name: service, ip, ports });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn logs(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
        service: Option<&str>,
        opts: &LogOptions,
    ) -> Result<Logs, RuntimeError> {
        let mut tail: Vec<String> = vec!["logs".to_string(), "--no-color".to_string()];
        if let Some(n) = opts.tail {
            tail.push("--tail".to_string());
            tail.push(n.to_string());
        }
        if opts.follow {
            tail.push("-f".to_string());
        }
        if let Some(service) = service {
            tail.push(service.to_string());
        }

        let mut args = self.compose_args(desc, env);
        args.extend(tail);

        if opts.follow {
            let mut cmd = tokio::process::Command::new(self.compose_bin());
            cmd.args(&args)
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true);
            let child = cmd.spawn().map_err(|e| {
                RuntimeError::Subprocess(crate::subprocess::SubprocessError::Spawn {
                    label: "compose logs".to_string(),
                    source: e,
                })
            })?;
            Ok(Logs::Follow(LogStream::new(child)))
        } else {
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let out =
                run_checked(self.compose_bin(), &arg_refs, DEFAULT_TIMEOUT, "compose logs").await?;
            Ok(Logs::Complete(out))
        }
    }

    async fn exec(
        &self,
        desc: &EnvironmentDescription,
        env: &str,
        service: &str,
        cmd: &[String],
    ) -> Result<String, RuntimeError> {
        if desc.service(service).is_none() {
            return Err(RuntimeError::UnknownService(service.to_string()));
        }
        let mut tail: Vec<&str> = vec!["exec", "-T", service];
        tail.extend(cmd.iter().map(String::as_str));
        self.run_compose(desc, env, &tail, DEFAULT_TIMEOUT, "compose exec").await
    }

    async fn create_network(&self, env: &str, subnet: Ipv4Net) -> Result<(), RuntimeError> {
        let name = network_name(env);

        // Idempotency: an existing network with the same subnet is fine,
        // anything else on that name is a collision.
        if let Ok(existing) = run_checked(
            &self.engine,
            &["network", "inspect", "-f", "{{(index .IPAM.Config 0).Subnet}}", &name],
            DEFAULT_TIMEOUT,
            "network inspect",
        )
        .await
        {
            return match existing.parse::<Ipv4Net>() {
                Ok(net) if net == subnet => Ok(()),
                _ => Err(RuntimeError::NetworkCollision {
                    name,
                    detail: format!("exists with subnet {existing}"),
                }),
            };
        }

        let subnet_arg = subnet.to_string();
        let result = run_checked(
            &self.engine,
            &[
                "network",
                "create",
                "--driver",
                "bridge",
                "--subnet",
                &subnet_arg,
                "--label",
                crate::OWNED_LABEL,
                &name,
            ],
            DEFAULT_TIMEOUT,
            "network create",
        )
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(crate::subprocess::SubprocessError::Failed { stderr, .. })
                if stderr.contains("overlap") =>
            {
                Err(RuntimeError::NetworkCollision { name, detail: stderr })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_network(&self, env: &str) -> Result<(), RuntimeError> {
        let name = network_name(env);
        let result =
            run_checked(&self.engine, &["network", "rm", &name], DEFAULT_TIMEOUT, "network rm")
                .await;
        match result {
            Ok(_) => Ok(()),
            // Already gone: removal is idempotent
            Err(crate::subprocess::SubprocessError::Failed { stderr, .. })
                if stderr.contains("not found") || stderr.contains("no such network") =>
            {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_owned_networks(&self) -> Result<Vec<String>, RuntimeError> {
        let filter = format!("label={}", crate::OWNED_LABEL);
        let out = run_checked(
            &self.engine,
            &["network", "ls", "--filter", &filter, "--format", "{{.Name}}"],
            DEFAULT_TIMEOUT,
            "network ls",
        )
        .await?;
        Ok(out.lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
    }
}

/// Content of the generated override attaching the project's default
/// network to the environment's bridge.
pub fn override_content(env: &str) -> String {
    format!(
        "# generated by cilo; do not edit\nnetworks:\n  default:\n    name: {}\n    external: true\n",
        network_name(env)
    )
}

async fn write_override(dir: &Path, env: &str) -> Result<PathBuf, RuntimeError> {
    let path = dir.join(OVERRIDE_FILE);
    tokio::fs::write(&path, override_content(env)).await?;
    Ok(path)
}

/// Service name out of a compose container name.
///
/// docker compose names containers `<project>-<service>-<n>`,
/// podman-compose uses `<project>_<service>_<n>`.
pub fn service_from_container_name(
    project: &str,
    container: &str,
    separator: char,
) -> Option<String> {
    let rest = container.strip_prefix(project)?.strip_prefix(separator)?;
    match rest.rsplit_once(separator) {
        Some((service, index)) if index.chars().all(|c| c.is_ascii_digit()) && !service.is_empty() => {
            Some(service.to_string())
        }
        // Some tools omit the replica index for single containers
        _ if !rest.is_empty() => Some(rest.to_string()),
        _ => None,
    }
}

/// `compose ps --format json` output: docker emits one JSON object per
/// line, older releases an array. Be liberal in what we accept.
fn parse_ps_output(out: &str) -> Vec<ServiceState> {
    let mut states = Vec::new();
    let mut push = |value: &serde_json::Value| {
        let name = value
            .get("Service")
            .or_else(|| value.get("service"))
            .or_else(|| value.get("Name"))
            .and_then(|v| v.as_str());
        let state = value
            .get("State")
            .or_else(|| value.get("state"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        if let Some(name) = name {
            states.push(ServiceState { name: name.to_string(), state: state.to_string() });
        }
    };

    let trimmed = out.trim();
    if trimmed.starts_with('[') {
        if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(trimmed) {
            for item in &items {
                push(item);
            }
        }
    } else {
        for line in trimmed.lines() {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
                push(&value);
            }
        }
    }
    states
}

#[cfg(test)]
#[path = "compose_cli_tests.rs"]
mod tests;
