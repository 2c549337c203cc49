// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and schema.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. The [`Database`] struct IS the single writer -- do NOT create
//! additional Connection instances for writes.

use rusqlite::Connection as SqliteConnection;
use tokio_rusqlite::Connection;
use tracing::debug;

use switchboard_core::SwitchboardError;

/// Schema applied at open. `IF NOT EXISTS` keeps reopen idempotent.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS kv_list (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    key        TEXT NOT NULL,
    entry      TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_kv_list_key ON kv_list(key, seq);

CREATE TABLE IF NOT EXISTS scheduled_tasks (
    id            TEXT PRIMARY KEY,
    kind          TEXT NOT NULL,
    payload       TEXT NOT NULL,
    scheduled_for INTEGER NOT NULL,
    status        TEXT NOT NULL DEFAULT 'pending',
    claimed_at    INTEGER
);
CREATE INDEX IF NOT EXISTS idx_tasks_due ON scheduled_tasks(status, scheduled_for);

CREATE TABLE IF NOT EXISTS rate_windows (
    key    TEXT NOT NULL,
    hit_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rate_windows_key ON rate_windows(key, hit_at);
";

/// Handle to the single-writer SQLite connection.
///
/// Cloning is cheap: clones share the same background writer thread.
#[derive(Clone)]
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, applying PRAGMAs and schema.
    pub async fn open(path: &str) -> Result<Self, SwitchboardError> {
        let connection = Connection::open(path)
            .await
            .map_err(|err| map_tr_err(err.into()))?;

        connection
            .call(|conn: &mut SqliteConnection| -> Result<(), rusqlite::Error> {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;",
                )?;
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        debug!(path, "state store opened");
        Ok(Self { connection })
    }

    /// Open an in-memory database. Used by tests.
    pub async fn open_in_memory() -> Result<Self, SwitchboardError> {
        let connection = Connection::open_in_memory()
            .await
            .map_err(|err| map_tr_err(err.into()))?;
        connection
            .call(|conn: &mut SqliteConnection| -> Result<(), rusqlite::Error> {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(Self { connection })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Flush the WAL and close out pending writes.
    pub async fn close(&self) -> Result<(), SwitchboardError> {
        self.connection
            .call(|conn: &mut SqliteConnection| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("state store checkpoint complete");
        Ok(())
    }
}

/// Map a tokio-rusqlite error into the shared persistence error.
pub fn map_tr_err(err: tokio_rusqlite::Error) -> SwitchboardError {
    SwitchboardError::Persistence {
        source: Box::new(err),
    }
}

/// Current time as unix milliseconds, the store's on-disk time unit.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
