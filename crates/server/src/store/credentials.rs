// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential rows.

use super::{decode_err, Store};
use chrono::{DateTime, Utc};
use cilo_core::{Credential, CredentialId};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn credential_from_row(row: &SqliteRow) -> Result<Credential, sqlx::Error> {
    let scope: String = row.try_get("scope")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(Credential {
        id: CredentialId::from_string(row.try_get::<String, _>("id")?),
        team_id: row.try_get("team_id")?,
        scope: scope.parse().map_err(|e| decode_err("scope", e))?,
        secret_hash: row.try_get("secret_hash")?,
        prefix: row.try_get("prefix")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| decode_err("created_at", e))?,
    })
}

impl Store {
    pub async fn insert_credential(&self, credential: &Credential) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO credentials (id, team_id, scope, secret_hash, prefix, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(credential.id.as_str())
        .bind(&credential.team_id)
        .bind(credential.scope.to_string())
        .bind(&credential.secret_hash)
        .bind(&credential.prefix)
        .bind(credential.created_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Bearer lookup: the presented secret is hashed and matched.
    pub async fn find_credential_by_hash(
        &self,
        secret_hash: &str,
    ) -> Result<Option<Credential>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM credentials WHERE secret_hash = ?")
            .bind(secret_hash)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(credential_from_row).transpose()
    }

    pub async fn list_credentials(&self, team_id: &str) -> Result<Vec<Credential>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM credentials WHERE team_id = ? ORDER BY created_at",
        )
        .bind(team_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(credential_from_row).collect()
    }

    pub async fn delete_credential(&self, id: &CredentialId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM credentials WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn count_credentials(&self) -> Result<usize, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM credentials")
            .fetch_one(self.pool())
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as usize)
    }
}
