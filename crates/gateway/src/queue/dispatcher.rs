// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-kiosk FIFO command queue with at-least-once delivery and retries
//! (spec §4.5).

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use locker_core::command::{Command, CommandPayload, CommandResult, CommandStatus};
use locker_core::event::{EventType, NewEvent};

use crate::store::event_log::insert_event_tx;

pub struct CommandDispatcher {
    pool: SqlitePool,
    default_max_retries: u32,
    retry_base: chrono::Duration,
    retry_max: chrono::Duration,
}

impl CommandDispatcher {
    pub fn new(pool: SqlitePool, default_max_retries: u32) -> Self {
        Self {
            pool,
            default_max_retries,
            retry_base: chrono::Duration::milliseconds(1_000),
            retry_max: chrono::Duration::milliseconds(30_000),
        }
    }

    pub fn with_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.retry_base = chrono::Duration::milliseconds(base_ms as i64);
        self.retry_max = chrono::Duration::milliseconds(max_ms as i64);
        self
    }

    /// Enqueue one command for a kiosk. Caller validates the payload
    /// structurally (`CommandPayload::validate`) before calling this.
    pub async fn enqueue(&self, kiosk_id: &str, payload: CommandPayload) -> anyhow::Result<Command> {
        let command = Command::new(kiosk_id, payload, self.default_max_retries);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO commands
             (command_id, kiosk_id, command_type, payload_json, status, retry_count, max_retries,
              next_attempt_at, created_at, completed_at, last_error)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL)",
        )
        .bind(command.command_id.to_string())
        .bind(&command.kiosk_id)
        .bind(command.payload.command_type())
        .bind(serde_json::to_string(&command.payload)?)
        .bind(command.status.as_str())
        .bind(command.retry_count)
        .bind(command.max_retries)
        .bind(command.next_attempt_at.to_rfc3339())
        .bind(command.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let event = NewEvent::new(kiosk_id, EventType::CommandEnqueued)
            .with_details(json!({ "command_id": command.command_id, "command_type": command.payload.command_type() }));
        insert_event_tx(&mut tx, &event).await?;

        tx.commit().await?;
        Ok(command)
    }

    /// `GET /commands?kiosk_id=K&limit=N`: claims up to `limit` pending,
    /// due commands by marking them `in_flight` so a concurrent poll from a
    /// retried connection doesn't redeliver them within the same window.
    pub async fn poll(&self, kiosk_id: &str, limit: i64) -> anyhow::Result<Vec<Command>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT command_id, kiosk_id, command_type, payload_json, status, retry_count, max_retries,
                    next_attempt_at, created_at, completed_at, last_error
             FROM commands
             WHERE kiosk_id = ? AND status = 'pending' AND next_attempt_at <= ?
             ORDER BY created_at ASC LIMIT ?",
        )
        .bind(kiosk_id)
        .bind(now.to_rfc3339())
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let mut commands = Vec::with_capacity(rows.len());
        for row in &rows {
            let command = row_to_command(row)?;
            sqlx::query("UPDATE commands SET status = 'in_flight' WHERE command_id = ?")
                .bind(command.command_id.to_string())
                .execute(&mut *tx)
                .await?;
            commands.push(command);
        }

        tx.commit().await?;
        Ok(commands)
    }

    /// `POST /commands/complete`.
    pub async fn complete(&self, result: &CommandResult) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT kiosk_id, command_type, retry_count, max_retries FROM commands WHERE command_id = ?",
        )
        .bind(result.command_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await.ok();
            return Ok(false);
        };
        let kiosk_id: String = row.try_get("kiosk_id")?;
        let command_type: String = row.try_get("command_type")?;
        let retry_count: i64 = row.try_get("retry_count")?;
        let max_retries: i64 = row.try_get("max_retries")?;

        if result.success {
            let now = Utc::now();
            let updated = sqlx::query(
                "UPDATE commands SET status = 'completed', completed_at = ?
                 WHERE command_id = ? AND status IN ('pending', 'in_flight')",
            )
            .bind(now.to_rfc3339())
            .bind(result.command_id.to_string())
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                tx.rollback().await.ok();
                return Ok(false);
            }

            let event = NewEvent::new(&kiosk_id, EventType::CommandCompleted).with_details(json!({
                "command_id": result.command_id,
                "command_type": command_type,
            }));
            insert_event_tx(&mut tx, &event).await?;
        } else {
            let new_retry_count = retry_count + 1;
            if new_retry_count >= max_retries {
                let updated = sqlx::query(
                    "UPDATE commands SET status = 'failed', retry_count = ?, last_error = ?
                     WHERE command_id = ? AND status IN ('pending', 'in_flight')",
                )
                .bind(new_retry_count)
                .bind(&result.error)
                .bind(result.command_id.to_string())
                .execute(&mut *tx)
                .await?;

                if updated.rows_affected() == 0 {
                    tx.rollback().await.ok();
                    return Ok(false);
                }

                let event = NewEvent::new(&kiosk_id, EventType::CommandFailed).with_details(json!({
                    "command_id": result.command_id,
                    "command_type": command_type,
                    "error": result.error,
                }));
                insert_event_tx(&mut tx, &event).await?;
            } else {
                let next_attempt_at = Utc::now() + self.backoff_for(new_retry_count as u32);
                let updated = sqlx::query(
                    "UPDATE commands SET status = 'pending', retry_count = ?, next_attempt_at = ?, last_error = ?
                     WHERE command_id = ? AND status IN ('pending', 'in_flight')",
                )
                .bind(new_retry_count)
                .bind(next_attempt_at.to_rfc3339())
                .bind(&result.error)
                .bind(result.command_id.to_string())
                .execute(&mut *tx)
                .await?;

                if updated.rows_affected() == 0 {
                    tx.rollback().await.ok();
                    return Ok(false);
                }
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    /// `POST /commands/clear-stale`: fails pending commands left over from a
    /// prior kiosk lifetime.
    pub async fn clear_stale(&self, kiosk_id: &str, stale_threshold: chrono::Duration) -> anyhow::Result<u64> {
        let cutoff = Utc::now() - stale_threshold;
        let mut tx = self.pool.begin().await?;

        let stale = sqlx::query(
            "SELECT command_id FROM commands WHERE kiosk_id = ? AND status = 'pending' AND created_at < ?",
        )
        .bind(kiosk_id)
        .bind(cutoff.to_rfc3339())
        .fetch_all(&mut *tx)
        .await?;

        let count = stale.len() as u64;
        if count > 0 {
            sqlx::query(
                "UPDATE commands SET status = 'failed', last_error = 'stale across restart'
                 WHERE kiosk_id = ? AND status = 'pending' AND created_at < ?",
            )
            .bind(kiosk_id)
            .bind(cutoff.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(count)
    }

    fn backoff_for(&self, retry_count: u32) -> chrono::Duration {
        let factor = 1i64.checked_shl(retry_count).unwrap_or(i64::MAX);
        let scaled = self.retry_base.num_milliseconds().saturating_mul(factor);
        chrono::Duration::milliseconds(scaled.min(self.retry_max.num_milliseconds()))
    }
}

fn row_to_command(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Command> {
    let command_id: String = row.try_get("command_id")?;
    let payload_str: String = row.try_get("payload_json")?;
    let status_str: String = row.try_get("status")?;
    let next_attempt_str: String = row.try_get("next_attempt_at")?;
    let created_at_str: String = row.try_get("created_at")?;
    let completed_at_str: Option<String> = row.try_get("completed_at")?;

    Ok(Command {
        command_id: Uuid::parse_str(&command_id)?,
        kiosk_id: row.try_get("kiosk_id")?,
        payload: serde_json::from_str::<CommandPayload>(&payload_str)?,
        status: CommandStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown command status {status_str}"))?,
        retry_count: row.try_get::<i64, _>("retry_count")? as u32,
        max_retries: row.try_get::<i64, _>("max_retries")? as u32,
        next_attempt_at: DateTime::parse_from_rfc3339(&next_attempt_str)?.with_timezone(&Utc),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc),
        completed_at: completed_at_str
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
            .transpose()?,
        last_error: row.try_get("last_error")?,
    })
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
