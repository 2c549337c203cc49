// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sliding-window hit counters for rate limiting.
//!
//! Hits are timestamped rows pruned on every increment, so the table
//! never holds more than one window's worth of rows per key.

use rusqlite::params;
use switchboard_core::SwitchboardError;

use crate::database::{map_tr_err, now_millis, Database};

/// Record a hit against `key` and return the number of hits inside the
/// window (including this one).
pub async fn increment(
    db: &Database,
    key: &str,
    window_millis: i64,
) -> Result<u64, SwitchboardError> {
    let key = key.to_string();
    let now = now_millis();
    let window_start = now - window_millis;
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM rate_windows WHERE key = ?1 AND hit_at < ?2",
                params![key, window_start],
            )?;
            tx.execute(
                "INSERT INTO rate_windows (key, hit_at) VALUES (?1, ?2)",
                params![key, now],
            )?;
            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM rate_windows WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(count as u64)
        })
        .await
        .map_err(map_tr_err)
}
