// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capped append-only lists, used for the per-conversation event log.

use rusqlite::params;
use switchboard_core::SwitchboardError;

use crate::database::{map_tr_err, now_millis, Database};

/// Append `entry` to the list at `key`, trimming the oldest rows beyond
/// `cap` and refreshing the expiry of the whole list.
pub async fn append(
    db: &Database,
    key: &str,
    entry: &serde_json::Value,
    cap: usize,
    ttl_millis: i64,
) -> Result<(), SwitchboardError> {
    let key = key.to_string();
    let entry = entry.to_string();
    let expires_at = now_millis() + ttl_millis;
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO kv_list (key, entry, expires_at) VALUES (?1, ?2, ?3)",
                params![key, entry, expires_at],
            )?;
            // Keep only the newest `cap` rows and refresh expiry on survivors.
            tx.execute(
                "DELETE FROM kv_list WHERE key = ?1 AND seq NOT IN (
                     SELECT seq FROM kv_list WHERE key = ?1 ORDER BY seq DESC LIMIT ?2
                 )",
                params![key, cap as i64],
            )?;
            tx.execute(
                "UPDATE kv_list SET expires_at = ?2 WHERE key = ?1",
                params![key, expires_at],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Read the list at `key`, oldest first, skipping expired rows.
pub async fn get(db: &Database, key: &str) -> Result<Vec<serde_json::Value>, SwitchboardError> {
    let key = key.to_string();
    let now = now_millis();
    let rows: Vec<String> = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT entry FROM kv_list
                 WHERE key = ?1 AND expires_at > ?2
                 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![key, now], |row| row.get(0))?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)?;

    rows.into_iter()
        .map(|text| {
            serde_json::from_str(&text).map_err(|e| SwitchboardError::Persistence {
                source: Box::new(e),
            })
        })
        .collect()
}
