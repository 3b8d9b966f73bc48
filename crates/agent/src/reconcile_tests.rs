// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::FakeRuntime;

#[tokio::test]
async fn clean_state_reports_intact_environments() {
    let dir = tempfile::tempdir().unwrap();
    let workspaces = WorkspaceStore::new(dir.path());
    workspaces.ensure("dev").await.unwrap();

    let runtime = FakeRuntime::default();
    runtime
        .create_network("dev", "10.224.1.0/24".parse().unwrap())
        .await
        .unwrap();

    let divergence = reconcile(&workspaces, &runtime).await.unwrap();
    assert!(divergence.is_clean());
    assert_eq!(divergence.intact, vec!["dev"]);
}

#[tokio::test]
async fn divergences_are_split_by_side() {
    let dir = tempfile::tempdir().unwrap();
    let workspaces = WorkspaceStore::new(dir.path());
    workspaces.ensure("only-workspace").await.unwrap();

    let runtime = FakeRuntime::default();
    runtime
        .create_network("only-network", "10.224.2.0/24".parse().unwrap())
        .await
        .unwrap();

    let divergence = reconcile(&workspaces, &runtime).await.unwrap();
    assert!(!divergence.is_clean());
    assert_eq!(divergence.workspace_only, vec!["only-workspace"]);
    assert_eq!(divergence.network_only, vec!["only-network"]);
    assert!(divergence.intact.is_empty());
}

#[tokio::test]
async fn foreign_networks_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let workspaces = WorkspaceStore::new(dir.path());
    let runtime = FakeRuntime::default();

    // FakeRuntime only tracks owned networks, so an empty workspace root
    // against no owned networks is trivially clean.
    let divergence = reconcile(&workspaces, &runtime).await.unwrap();
    assert!(divergence.is_clean());
    assert!(divergence.intact.is_empty());
}
