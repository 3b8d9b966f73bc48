// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed state store.
//!
//! The store is the single mutator of environment/machine/credential/peer
//! rows; readers only ever see committed state. Every lifecycle transition
//! is a conditional UPDATE (`... WHERE status = ?`), so racing writers get
//! a row count of zero instead of clobbering each other — machine
//! assignment in particular relies on this for its at-most-one-winner
//! guarantee.

mod credentials;
mod environments;
mod machines;
mod peers;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Truthy when an insert bounced off a UNIQUE constraint (name conflicts,
/// duplicate peer keys).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}

/// Wrap a field-parse failure as a decode error.
pub(crate) fn decode_err(
    context: &str,
    detail: impl std::fmt::Display,
) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("{context}: {detail}"),
    )))
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `path`; `:memory:` gives a
    /// private in-memory store for tests.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let pool = if path == ":memory:" {
            // One connection, or every handle would see its own empty DB
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
                .await?
        } else {
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .busy_timeout(std::time::Duration::from_secs(30));
            SqlitePoolOptions::new().max_connections(5).connect_with(options).await?
        };
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS environments (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    team_id     TEXT NOT NULL,
    project     TEXT,
    format      TEXT NOT NULL,
    machine_id  TEXT,
    status      TEXT NOT NULL,
    subnet      TEXT NOT NULL,
    services    TEXT NOT NULL DEFAULT '[]',
    origin      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    expires_at  TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS environments_active_name
    ON environments(team_id, name) WHERE status != 'destroyed';

CREATE TABLE IF NOT EXISTS machines (
    id              TEXT PRIMARY KEY,
    provider        TEXT NOT NULL,
    address         TEXT NOT NULL,
    endpoint        TEXT NOT NULL,
    public_key      TEXT NOT NULL,
    status          TEXT NOT NULL,
    environment_id  TEXT,
    peer_subnet     TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    id          TEXT PRIMARY KEY,
    team_id     TEXT NOT NULL,
    scope       TEXT NOT NULL,
    secret_hash TEXT NOT NULL UNIQUE,
    prefix      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS peers (
    id              TEXT PRIMARY KEY,
    user_name       TEXT NOT NULL,
    public_key      TEXT NOT NULL,
    ip              TEXT NOT NULL,
    environment_id  TEXT NOT NULL,
    machine_id      TEXT NOT NULL,
    connected_at    TEXT NOT NULL,
    UNIQUE(machine_id, public_key),
    UNIQUE(machine_id, ip)
);
"#;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
