// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-ordered scheduled task queue with atomic claiming.
//!
//! `claim_due` moves due tasks from `pending` to `claimed` inside one
//! statement, so two concurrent sweepers can never claim the same task.
//! Execution is at-least-once overall: a claimed task whose executor
//! dies before `complete` stays claimed and is re-offered after the
//! stale-claim cutoff.

use chrono::{TimeZone, Utc};
use rusqlite::params;
use switchboard_core::types::{ScheduledTask, TaskStatus};
use switchboard_core::SwitchboardError;

use crate::database::{map_tr_err, now_millis, Database};

/// Claims older than this are considered abandoned and re-offered.
const STALE_CLAIM_MILLIS: i64 = 5 * 60 * 1000;

/// Enqueue a task due at `now + delay_millis`. Returns the task id.
pub async fn schedule(
    db: &Database,
    kind: &str,
    payload: &serde_json::Value,
    delay_millis: i64,
) -> Result<String, SwitchboardError> {
    let id = uuid::Uuid::new_v4().to_string();
    let kind = kind.to_string();
    let payload = payload.to_string();
    let scheduled_for = now_millis() + delay_millis;
    let id_out = id.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO scheduled_tasks (id, kind, payload, scheduled_for, status)
                 VALUES (?1, ?2, ?3, ?4, 'pending')",
                params![id, kind, payload, scheduled_for],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(id_out)
}

/// Atomically claim up to `limit` due tasks, oldest due first.
pub async fn claim_due(
    db: &Database,
    limit: usize,
) -> Result<Vec<ScheduledTask>, SwitchboardError> {
    let now = now_millis();
    let stale_cutoff = now - STALE_CLAIM_MILLIS;
    let rows: Vec<(String, String, String, i64)> = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "UPDATE scheduled_tasks SET status = 'claimed', claimed_at = ?1
                 WHERE id IN (
                     SELECT id FROM scheduled_tasks
                     WHERE scheduled_for <= ?1
                       AND (status = 'pending'
                            OR (status = 'claimed' AND claimed_at <= ?2))
                     ORDER BY scheduled_for ASC
                     LIMIT ?3
                 )
                 RETURNING id, kind, payload, scheduled_for",
            )?;
            let rows = stmt.query_map(params![now, stale_cutoff, limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            let mut claimed = Vec::new();
            for row in rows {
                claimed.push(row?);
            }
            Ok(claimed)
        })
        .await
        .map_err(map_tr_err)?;

    rows.into_iter()
        .map(|(id, kind, payload, scheduled_for)| {
            let payload =
                serde_json::from_str(&payload).map_err(|e| SwitchboardError::Persistence {
                    source: Box::new(e),
                })?;
            Ok(ScheduledTask {
                id,
                kind,
                payload,
                scheduled_for: Utc
                    .timestamp_millis_opt(scheduled_for)
                    .single()
                    .unwrap_or_else(Utc::now),
                status: TaskStatus::Pending,
            })
        })
        .collect()
}

/// Mark a claimed task completed. Idempotent.
pub async fn complete(db: &Database, task_id: &str) -> Result<(), SwitchboardError> {
    let task_id = task_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scheduled_tasks SET status = 'completed' WHERE id = ?1",
                params![task_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
