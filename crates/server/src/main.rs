// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cilod` — the cilo control server.

use clap::Parser;
use cilo_server::agent_client::AgentClient;
use cilo_server::http::{self, AppState};
use cilo_server::pool::cloud::CloudProvider;
use cilo_server::pool::reconciler::Reconciler;
use cilo_server::pool::MachineProvider;
use cilo_server::sweeper::Sweeper;
use cilo_server::{ServerConfig, Store, SubnetAllocator};
use cilo_core::{Credential, Scope, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cilod", version, about = "cilo control server")]
struct Args {
    /// Config file
    #[arg(long, default_value = "/etc/cilo/cilod.toml")]
    config: PathBuf,
    /// Log directory (in addition to stdout)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("cilod: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_env("CILO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    // Keep the guard alive for the lifetime of the process
    let _appender_guard = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "cilod.log");
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

    let config = ServerConfig::load(Some(&args.config))?;
    info!(bind = %config.bind, db = %config.db_path, "starting cilod");

    let store = Store::open(&config.db_path).await?;
    ensure_bootstrap_credential(&store, &config).await?;

    let allocator = SubnetAllocator::new(config.environment_cidr)?;
    let agent = Arc::new(AgentClient::new(config.ssh_key.clone()));

    let provider: Option<Arc<dyn MachineProvider>> = match &config.cloud {
        Some(cloud) => Some(Arc::new(CloudProvider::new(cloud, None)?)),
        None => None,
    };

    let cancel = CancellationToken::new();

    if let Some(provider) = provider.clone() {
        let reconciler = Reconciler::new(
            store.clone(),
            provider,
            config.pool.clone(),
            config.peer_subnet,
            SystemClock,
        );
        tokio::spawn(reconciler.run(cancel.child_token()));
    }

    let sweeper = Sweeper::new(
        store.clone(),
        Some(agent.clone()),
        SystemClock,
        std::time::Duration::from_secs(30),
    );
    tokio::spawn(sweeper.run(cancel.child_token()));

    let state = Arc::new(AppState { store, allocator, agent, provider, config: config.clone() });
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;
    Ok(())
}

/// First run on an empty store: mint the bootstrap admin credential and
/// print it once. Everything after that goes through the API.
async fn ensure_bootstrap_credential(
    store: &Store,
    config: &ServerConfig,
) -> Result<(), sqlx::Error> {
    if store.count_credentials().await? > 0 {
        return Ok(());
    }
    let (credential, secret) =
        Credential::generate(&config.team_id, Scope::Admin, chrono::Utc::now());
    store.insert_credential(&credential).await?;
    info!(credential_id = %credential.id, "bootstrap admin credential created");
    println!("bootstrap admin credential (shown once): {secret}");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
    cancel.cancel();
}
