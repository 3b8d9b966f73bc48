// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cilo-agent` — the per-machine daemon.

use clap::Parser;
use cilo_agent::auth::AuthState;
use cilo_agent::envs::EnvManager;
use cilo_agent::http::{self, AppState};
use cilo_agent::peers::PeerMap;
use cilo_agent::wg::WgInterface;
use cilo_agent::workspace::WorkspaceStore;
use cilo_agent::{netfilter, reconcile, AgentConfig};
use cilo_core::SystemClock;
use cilo_engine::{ComposeCli, ParserRegistry, Runtime};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cilo-agent", version, about = "cilo machine agent")]
struct Args {
    /// Config file
    #[arg(long, default_value = "/etc/cilo/agent.toml")]
    config: PathBuf,
    /// Log directory (in addition to stdout)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("cilo-agent: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_env("CILO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _appender_guard = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "cilo-agent.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stdout.and(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    };

    let config = AgentConfig::load(Some(&args.config))?;
    tokio::fs::create_dir_all(&config.state_dir).await?;
    tokio::fs::create_dir_all(config.workspace_root()).await?;

    // Overlay first: the API binds to its address.
    let wg = WgInterface::new(&config.interface, config.listen_port, config.wg_key_file());
    let overlay_addr = config.overlay_address()?;
    wg.ensure(overlay_addr, config.peer_subnet.prefix_len()).await?;
    netfilter::enable_ip_forwarding().await?;
    netfilter::ensure_rules(&config.interface, config.peer_subnet).await?;

    // Re-install persisted peers after a reboot.
    let peer_map = PeerMap::open(config.peer_map_path(), config.peer_subnet)?;
    for (key, ip) in peer_map.iter() {
        wg.add_peer(key, *ip).await?;
    }
    if !peer_map.is_empty() {
        info!(peers = peer_map.len(), "restored overlay peers");
    }

    let runtime = Arc::new(ComposeCli::detect(config.runtime.as_deref())?);
    info!(runtime = runtime.name(), "container runtime selected");
    let envs = EnvManager::new(
        ParserRegistry::with_defaults(),
        runtime,
        WorkspaceStore::new(config.workspace_root()),
    );

    let divergence = reconcile::reconcile(envs.workspaces(), envs.runtime()).await?;
    if !divergence.is_clean() {
        info!(
            workspace_only = divergence.workspace_only.len(),
            network_only = divergence.network_only.len(),
            "state divergences found at boot"
        );
    }

    let state = Arc::new(AppState {
        auth: AuthState::new(config.authorized_keys.clone(), SystemClock),
        peers: Mutex::new(peer_map),
        wg,
        envs,
    });

    let bind = config.api_bind()?;
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, "agent API listening (overlay only)");
    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
