// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cilo` — the client CLI.

use clap::Parser;
use cilo::commands::{self, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("CILO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // clap itself exits 2 on usage errors
    let cli = Cli::parse();
    if let Err(e) = commands::run(cli).await {
        eprintln!("cilo: {e}");
        std::process::exit(e.code);
    }
}
