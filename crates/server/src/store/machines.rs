// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine rows.

use super::{decode_err, Store};
use chrono::{DateTime, Utc};
use cilo_core::{EnvironmentId, Machine, MachineId, MachineStatus, Provider};
use ipnet::Ipv4Net;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

pub(crate) fn machine_from_row(row: &SqliteRow) -> Result<Machine, sqlx::Error> {
    let provider: String = row.try_get("provider")?;
    let status: String = row.try_get("status")?;
    let peer_subnet: String = row.try_get("peer_subnet")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Machine {
        id: MachineId::from_string(row.try_get::<String, _>("id")?),
        provider: match provider.as_str() {
            "manual" => Provider::Manual,
            "cloud" => Provider::Cloud,
            other => return Err(decode_err("provider", other)),
        },
        address: row.try_get("address")?,
        endpoint: row.try_get("endpoint")?,
        public_key: row.try_get("public_key")?,
        status: status.parse().map_err(|e| decode_err("status", e))?,
        environment_id: row
            .try_get::<Option<String>, _>("environment_id")?
            .map(EnvironmentId::from_string),
        peer_subnet: peer_subnet.parse::<Ipv4Net>().map_err(|e| decode_err("peer_subnet", e))?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| decode_err("created_at", e))?,
    })
}

impl Store {
    pub async fn insert_machine(&self, machine: &Machine) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO machines
             (id, provider, address, endpoint, public_key, status, environment_id,
              peer_subnet, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(machine.id.as_str())
        .bind(machine.provider.to_string())
        .bind(&machine.address)
        .bind(&machine.endpoint)
        .bind(&machine.public_key)
        .bind(machine.status.to_string())
        .bind(machine.environment_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(machine.peer_subnet.to_string())
        .bind(machine.created_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_machine(&self, id: &MachineId) -> Result<Option<Machine>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM machines WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(machine_from_row).transpose()
    }

    pub async fn list_machines(&self) -> Result<Vec<Machine>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM machines WHERE status != 'destroyed' ORDER BY created_at",
        )
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(machine_from_row).collect()
    }

    /// Machines a placement could use right now, in first-fit order.
    pub async fn list_assignable_machines(&self) -> Result<Vec<Machine>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM machines
             WHERE status = 'ready' AND environment_id IS NULL ORDER BY created_at",
        )
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(machine_from_row).collect()
    }

    /// Release after its environment leaves: `assigned → ready`. Idempotent;
    /// releasing an already-released machine matches no row and is fine.
    pub async fn release_machine(
        &self,
        machine_id: &MachineId,
        environment_id: &EnvironmentId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE machines SET status = 'ready', environment_id = NULL
             WHERE id = ? AND environment_id = ? AND status = 'assigned'",
        )
        .bind(machine_id.as_str())
        .bind(environment_id.as_str())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn transition_machine(
        &self,
        id: &MachineId,
        from: MachineStatus,
        to: MachineStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE machines SET status = ? WHERE id = ? AND status = ?")
            .bind(to.to_string())
            .bind(id.as_str())
            .bind(from.to_string())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Fill in the details learned once provisioning finished.
    pub async fn update_machine_details(
        &self,
        id: &MachineId,
        address: &str,
        endpoint: &str,
        public_key: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE machines SET address = ?, endpoint = ?, public_key = ? WHERE id = ?",
        )
        .bind(address)
        .bind(endpoint)
        .bind(public_key)
        .bind(id.as_str())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_machine(&self, id: &MachineId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM machines WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
