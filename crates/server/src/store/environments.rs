// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment rows.

use super::{decode_err, Store};
use chrono::{DateTime, Utc};
use cilo_core::{
    Environment, EnvironmentId, EnvironmentStatus, MachineId, Origin, Service,
};
use ipnet::Ipv4Net;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

pub(crate) fn environment_from_row(row: &SqliteRow) -> Result<Environment, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let subnet: String = row.try_get("subnet")?;
    let services: String = row.try_get("services")?;
    let origin: String = row.try_get("origin")?;
    let created_at: String = row.try_get("created_at")?;
    let expires_at: Option<String> = row.try_get("expires_at")?;

    Ok(Environment {
        id: EnvironmentId::from_string(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        team_id: row.try_get("team_id")?,
        project: row.try_get("project")?,
        format: row.try_get("format")?,
        machine_id: row
            .try_get::<Option<String>, _>("machine_id")?
            .map(MachineId::from_string),
        status: status.parse().map_err(|e| decode_err("status", e))?,
        subnet: subnet.parse::<Ipv4Net>().map_err(|e| decode_err("subnet", e))?,
        services: serde_json::from_str::<Vec<Service>>(&services)
            .map_err(|e| decode_err("services", e))?,
        peers: Vec::new(),
        origin: match origin.as_str() {
            "interactive" => Origin::Interactive,
            "automated" => Origin::Automated,
            "external" => Origin::External,
            other => return Err(decode_err("origin", other)),
        },
        created_at: parse_time(&created_at)?,
        expires_at: expires_at.as_deref().map(parse_time).transpose()?,
    })
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| decode_err("timestamp", e))
}

fn origin_str(origin: Origin) -> &'static str {
    match origin {
        Origin::Interactive => "interactive",
        Origin::Automated => "automated",
        Origin::External => "external",
    }
}

impl Store {
    /// Write the environment and assign its machine in one transaction.
    ///
    /// Returns `Ok(false)` when the machine was grabbed by a concurrent
    /// placement (conditional update matched no row); the caller retries
    /// with the next candidate. A unique-index violation on the active
    /// (team, name) pair surfaces as the underlying sqlx error.
    pub async fn insert_environment_assigning(
        &self,
        env: &Environment,
        machine_id: &MachineId,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let assigned = sqlx::query(
            "UPDATE machines SET status = 'assigned', environment_id = ?
             WHERE id = ? AND status = 'ready' AND environment_id IS NULL",
        )
        .bind(env.id.as_str())
        .bind(machine_id.as_str())
        .execute(&mut *tx)
        .await?;
        if assigned.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO environments
             (id, name, team_id, project, format, machine_id, status, subnet,
              services, origin, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(env.id.as_str())
        .bind(&env.name)
        .bind(&env.team_id)
        .bind(&env.project)
        .bind(&env.format)
        .bind(machine_id.as_str())
        .bind(env.status.to_string())
        .bind(env.subnet.to_string())
        .bind(serde_json::to_string(&env.services).unwrap_or_else(|_| "[]".to_string()))
        .bind(origin_str(env.origin))
        .bind(env.created_at.to_rfc3339())
        .bind(env.expires_at.map(|t| t.to_rfc3339()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn get_environment(
        &self,
        id: &EnvironmentId,
    ) -> Result<Option<Environment>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM environments WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;
        let mut env = match row {
            Some(row) => environment_from_row(&row)?,
            None => return Ok(None),
        };
        env.peers = self.list_peers_for_environment(id).await?;
        Ok(Some(env))
    }

    /// Active (non-destroyed) environment with this name, if any.
    pub async fn get_environment_by_name(
        &self,
        team_id: &str,
        name: &str,
    ) -> Result<Option<Environment>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT * FROM environments
             WHERE team_id = ? AND name = ? AND status != 'destroyed'",
        )
        .bind(team_id)
        .bind(name)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(environment_from_row).transpose()
    }

    pub async fn list_environments(&self, team_id: &str) -> Result<Vec<Environment>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM environments
             WHERE team_id = ? AND status != 'destroyed' ORDER BY created_at",
        )
        .bind(team_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(environment_from_row).collect()
    }

    /// Subnets held by all non-destroyed environments, for the allocator.
    pub async fn list_active_subnets(&self) -> Result<Vec<Ipv4Net>, sqlx::Error> {
        let rows =
            sqlx::query("SELECT subnet FROM environments WHERE status != 'destroyed'")
                .fetch_all(self.pool())
                .await?;
        rows.iter()
            .map(|row| {
                let s: String = row.try_get("subnet")?;
                s.parse().map_err(|e| decode_err("subnet", e))
            })
            .collect()
    }

    /// Conditional status transition; false when the row was not in `from`.
    pub async fn transition_environment(
        &self,
        id: &EnvironmentId,
        from: EnvironmentStatus,
        to: EnvironmentStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE environments SET status = ? WHERE id = ? AND status = ?")
            .bind(to.to_string())
            .bind(id.as_str())
            .bind(from.to_string())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Move any still-active environment to `error`.
    pub async fn set_environment_error(&self, id: &EnvironmentId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE environments SET status = 'error'
             WHERE id = ? AND status IN ('provisioning', 'syncing', 'running', 'stopped')",
        )
        .bind(id.as_str())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_environment_services(
        &self,
        id: &EnvironmentId,
        services: &[Service],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE environments SET services = ? WHERE id = ?")
            .bind(serde_json::to_string(services).unwrap_or_else(|_| "[]".to_string()))
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn clear_environment_machine(&self, id: &EnvironmentId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE environments SET machine_id = NULL WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Environments whose auto-destroy deadline has passed.
    pub async fn list_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Environment>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM environments
             WHERE expires_at IS NOT NULL AND expires_at <= ?
               AND status NOT IN ('destroying', 'destroyed')",
        )
        .bind(now.to_rfc3339())
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(environment_from_row).collect()
    }

    pub async fn count_active_environments(&self) -> Result<usize, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM environments WHERE status != 'destroyed'",
        )
        .fetch_one(self.pool())
        .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as usize)
    }
}
