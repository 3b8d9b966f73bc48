// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peer rows (the server-side mirror; the agent owns the canonical list).

use super::{decode_err, Store};
use chrono::{DateTime, Utc};
use cilo_core::{EnvironmentId, MachineId, Peer, PeerId};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn peer_from_row(row: &SqliteRow) -> Result<Peer, sqlx::Error> {
    let ip: String = row.try_get("ip")?;
    let connected_at: String = row.try_get("connected_at")?;
    Ok(Peer {
        id: PeerId::from_string(row.try_get::<String, _>("id")?),
        user: row.try_get("user_name")?,
        public_key: row.try_get("public_key")?,
        ip: ip.parse().map_err(|e| decode_err("ip", e))?,
        environment_id: EnvironmentId::from_string(row.try_get::<String, _>("environment_id")?),
        machine_id: MachineId::from_string(row.try_get::<String, _>("machine_id")?),
        connected_at: DateTime::parse_from_rfc3339(&connected_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| decode_err("connected_at", e))?,
    })
}

impl Store {
    pub async fn insert_peer(&self, peer: &Peer) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO peers
             (id, user_name, public_key, ip, environment_id, machine_id, connected_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(peer.id.as_str())
        .bind(&peer.user)
        .bind(&peer.public_key)
        .bind(peer.ip.to_string())
        .bind(peer.environment_id.as_str())
        .bind(peer.machine_id.as_str())
        .bind(peer.connected_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Remove by public key, returning the removed record so callers can
    /// mirror the removal onto the agent.
    pub async fn delete_peer_by_key(
        &self,
        public_key: &str,
    ) -> Result<Option<Peer>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM peers WHERE public_key = ?")
            .bind(public_key)
            .fetch_optional(self.pool())
            .await?;
        let peer = match row {
            Some(row) => peer_from_row(&row)?,
            None => return Ok(None),
        };
        sqlx::query("DELETE FROM peers WHERE public_key = ?")
            .bind(public_key)
            .execute(self.pool())
            .await?;
        Ok(Some(peer))
    }

    pub async fn list_peers_for_environment(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Peer>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM peers WHERE environment_id = ? ORDER BY connected_at",
        )
        .bind(environment_id.as_str())
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(peer_from_row).collect()
    }

    pub async fn delete_peers_for_environment(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM peers WHERE environment_id = ?")
            .bind(environment_id.as_str())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
