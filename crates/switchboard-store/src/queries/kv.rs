// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed value operations with per-key expiry.
//!
//! Expired keys read as absent and are lazily deleted on the read path,
//! so no background vacuum is needed for correctness.

use rusqlite::{params, OptionalExtension};
use switchboard_core::SwitchboardError;

use crate::database::{map_tr_err, now_millis, Database};

/// Store `value` under `key`, replacing any prior value.
pub async fn set(
    db: &Database,
    key: &str,
    value: &serde_json::Value,
    ttl_millis: i64,
) -> Result<(), SwitchboardError> {
    let key = key.to_string();
    let value = value.to_string();
    let expires_at = now_millis() + ttl_millis;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, expires_at = ?3",
                params![key, value, expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Read `key`, treating expired entries as absent.
pub async fn get(
    db: &Database,
    key: &str,
) -> Result<Option<serde_json::Value>, SwitchboardError> {
    let key = key.to_string();
    let now = now_millis();
    let raw: Option<String> = db
        .connection()
        .call(move |conn| {
            let row: Option<(String, i64)> = conn
                .query_row(
                    "SELECT value, expires_at FROM kv WHERE key = ?1",
                    params![key.clone()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            match row {
                Some((_, expires_at)) if expires_at <= now => {
                    // Lazy expiry: drop the stale row while we hold the writer.
                    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                    Ok(None)
                }
                Some((value, _)) => Ok(Some(value)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)?;

    match raw {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| SwitchboardError::Persistence {
                source: Box::new(e),
            }),
        None => Ok(None),
    }
}

/// Remove `key`. Removing an absent key is not an error.
pub async fn delete(db: &Database, key: &str) -> Result<(), SwitchboardError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
